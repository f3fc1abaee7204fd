use std::path::Path;

use checkin_core::sync::SyncOutcome;
use checkin_core::{EventId, LocalStore, RegformId};

use crate::commands::common::{
    build_coordinator, format_sync_outcome, load_config, open_store, outcome_to_result,
    resolve_regform,
};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_sync(
    event_id: EventId,
    regform_id: RegformId,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_config()?;
    let store = open_store(db_path).await?;
    resolve_regform(&store, event_id, regform_id).await?;

    let outcome = sync_once(&store, event_id, regform_id, &config).await?;
    println!("{}", format_sync_outcome(&outcome));
    outcome_to_result(outcome)?;
    Ok(())
}

/// Run a single activation for a cached registration form
pub async fn sync_once(
    store: &LocalStore,
    event_id: EventId,
    regform_id: RegformId,
    config: &CliConfig,
) -> Result<SyncOutcome, CliError> {
    let coordinator = build_coordinator(store, event_id, config).await?;
    Ok(coordinator.sync_regform(event_id, regform_id).await)
}
