use std::path::Path;

use checkin_core::db::RegformRemoval;
use checkin_core::sync::Notifier;
use checkin_core::{EventId, RegformId};

use crate::commands::common::{open_store, resolve_regform};
use crate::error::CliError;
use crate::notifier::{StderrNotifier, REMOVE_FAILED_TITLE};

pub async fn run_remove(
    event_id: EventId,
    regform_id: RegformId,
    cascade: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let (event, regform) = resolve_regform(&store, event_id, regform_id).await?;
    let removal = if cascade {
        RegformRemoval::CascadeParticipants
    } else {
        RegformRemoval::KeepParticipants
    };

    match store.delete_regform(regform.id, removal).await {
        Ok(_) => {
            println!(
                "Removed registration form '{}' from {}",
                regform.title, event.title
            );
            Ok(())
        }
        Err(error) => {
            StderrNotifier.notify(REMOVE_FAILED_TITLE, &error.to_string());
            Err(error.into())
        }
    }
}
