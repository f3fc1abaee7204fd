use std::path::Path;

use checkin_core::query::{RegformPage, RegformView};
use checkin_core::{EventId, LocalStore, RegformId};
use tokio::sync::watch;

use crate::commands::common::{
    format_sync_outcome, load_config, open_store, render_regform_view, summary_to_item,
};
use crate::commands::sync::sync_once;
use crate::error::CliError;

pub async fn run_show(
    event_id: EventId,
    regform_id: RegformId,
    no_sync: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;

    if !no_sync && store.get_event(event_id).await?.is_some() {
        let config = load_config()?;
        // Offline: fall through and show what is cached
        match sync_once(&store, event_id, regform_id, &config).await {
            Ok(outcome) => eprintln!("{}", format_sync_outcome(&outcome)),
            Err(error) => tracing::warn!("Could not refresh registration form: {error}"),
        }
    }

    let view = settled_view(&store, event_id, regform_id).await;
    match &view {
        RegformView::Ready(summary) if as_json => {
            println!("{}", serde_json::to_string_pretty(&summary_to_item(summary))?);
            Ok(())
        }
        RegformView::Ready(_) => {
            for line in render_regform_view(&view) {
                println!("{line}");
            }
            Ok(())
        }
        RegformView::EventNotFound => Err(CliError::EventNotFound(event_id)),
        RegformView::RegformNotFound => Err(CliError::RegformNotFound(event_id, regform_id)),
        RegformView::Failed(error) => Err(CliError::LocalRead(error.clone())),
        RegformView::Loading => Err(CliError::LocalRead("query did not settle".to_string())),
    }
}

/// First non-loading view of the page
pub async fn settled_view(
    store: &LocalStore,
    event_id: EventId,
    regform_id: RegformId,
) -> RegformView {
    let (_syncing_tx, syncing) = watch::channel(false);
    let mut page = RegformPage::open(store, event_id, regform_id, syncing);
    page.wait_until(|view| !matches!(view, RegformView::Loading))
        .await
}
