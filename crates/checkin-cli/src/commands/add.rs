use std::path::Path;

use checkin_core::onboarding::register;

use crate::commands::common::{format_sync_outcome, load_config, open_store, outcome_to_result};
use crate::commands::sync::sync_once;
use crate::error::CliError;

pub async fn run_add(
    server: Option<&str>,
    event_indico_id: i64,
    regform_indico_id: i64,
    no_sync: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_config()?;
    let server = config.resolve_server(server).ok_or(CliError::NoServer)?;
    let store = open_store(db_path).await?;

    let onboarded = register(&store, &server, event_indico_id, regform_indico_id).await?;
    if onboarded.created {
        println!(
            "Added registration form {} (event {})",
            onboarded.regform_id, onboarded.event_id
        );
    } else {
        println!(
            "Registration form {} (event {}) is already cached",
            onboarded.regform_id, onboarded.event_id
        );
    }

    if !no_sync {
        let outcome = sync_once(&store, onboarded.event_id, onboarded.regform_id, &config).await?;
        println!("{}", format_sync_outcome(&outcome));
        outcome_to_result(outcome)?;
    }
    Ok(())
}
