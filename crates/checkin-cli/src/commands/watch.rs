use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use checkin_core::query::{RegformPage, RegformView};
use checkin_core::{EventId, RegformId};
use tokio::time::MissedTickBehavior;

use crate::commands::common::{
    build_coordinator, format_sync_outcome, load_config, open_store, render_regform_view,
    resolve_regform, Coordinator,
};
use crate::error::CliError;

pub async fn run_watch(
    event_id: EventId,
    regform_id: RegformId,
    interval_secs: Option<u64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_config()?;
    let store = open_store(db_path).await?;
    resolve_regform(&store, event_id, regform_id).await?;

    let coordinator = Arc::new(build_coordinator(&store, event_id, &config).await?);
    let every = interval_secs
        .filter(|secs| *secs > 0)
        .map_or_else(|| config.watch_interval(), Duration::from_secs);

    let mut page = RegformPage::open(&store, event_id, regform_id, coordinator.syncing());
    let syncer = tokio::spawn(sync_periodically(
        Arc::clone(&coordinator),
        event_id,
        regform_id,
        every,
    ));
    tracing::info!("Watching regform {regform_id}, syncing every {}s", every.as_secs());

    render(&page.view());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let result = loop {
        tokio::select! {
            result = &mut ctrl_c => break result,
            view = page.changed() => render(&view),
        }
    };

    coordinator.shutdown();
    syncer.abort();
    drop(page);
    store.close().await;
    result.map_err(CliError::Io)
}

async fn sync_periodically(
    coordinator: Arc<Coordinator>,
    event_id: EventId,
    regform_id: RegformId,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let outcome = coordinator.sync_regform(event_id, regform_id).await;
        tracing::debug!("{}", format_sync_outcome(&outcome));
    }
}

fn render(view: &RegformView) {
    if io::stdout().is_terminal() {
        print!("\x1b[2J\x1b[H");
    } else {
        println!("---");
    }
    for line in render_regform_view(view) {
        println!("{line}");
    }
}
