use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use checkin_core::query::{RegformSummary, RegformView};
use checkin_core::remote::{GatewayConfig, IndicoGateway};
use checkin_core::sync::{Missing, SyncCoordinator, SyncOutcome};
use checkin_core::{Event, EventId, LocalStore, Regform, RegformId};
use serde::Serialize;

use crate::auth::resolve_token;
use crate::config::CliConfig;
use crate::error::CliError;
use crate::notifier::StderrNotifier;

pub type Coordinator = SyncCoordinator<IndicoGateway, StderrNotifier>;

#[derive(Debug, Serialize)]
pub struct EventListItem {
    pub id: i64,
    pub indico_id: i64,
    pub title: String,
    pub server: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct RegformListItem {
    pub id: i64,
    pub indico_id: i64,
    pub title: String,
    pub is_open: bool,
    pub registration_count: i64,
    pub checked_in_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ParticipantItem {
    pub id: i64,
    pub full_name: String,
    pub checked_in: bool,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct RegformPageItem {
    pub event: EventListItem,
    pub regform: RegformListItem,
    pub management_url: String,
    pub participants: Vec<ParticipantItem>,
}

pub fn event_to_list_item(event: &Event) -> EventListItem {
    EventListItem {
        id: event.id.get(),
        indico_id: event.indico_id,
        title: event.title.clone(),
        server: event.base_url.clone(),
        url: event.remote_url(),
    }
}

pub fn regform_to_list_item(regform: &Regform) -> RegformListItem {
    RegformListItem {
        id: regform.id.get(),
        indico_id: regform.indico_id,
        title: regform.title.clone(),
        is_open: regform.is_open,
        registration_count: regform.registration_count,
        checked_in_count: regform.checked_in_count,
    }
}

pub fn summary_to_item(summary: &RegformSummary) -> RegformPageItem {
    RegformPageItem {
        event: event_to_list_item(&summary.event),
        regform: regform_to_list_item(&summary.regform),
        management_url: summary.management_url.clone(),
        participants: summary
            .rows
            .iter()
            .map(|row| ParticipantItem {
                id: row.id.get(),
                full_name: row.full_name.clone(),
                checked_in: row.checked_in,
                path: row.route.to_string(),
            })
            .collect(),
    }
}

pub fn format_event_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            format!(
                "{:>4}  {}  ({})",
                event.id,
                event.title,
                event.remote_url()
            )
        })
        .collect()
}

pub fn format_regform_lines(regforms: &[Regform]) -> Vec<String> {
    regforms
        .iter()
        .map(|regform| {
            format!(
                "{:>4}  {}  [{}]  {}/{} checked in",
                regform.id,
                regform.title,
                regform.status_label(),
                regform.checked_in_count,
                regform.registration_count
            )
        })
        .collect()
}

pub fn render_regform_view(view: &RegformView) -> Vec<String> {
    match view {
        RegformView::Loading => vec!["Loading...".to_string()],
        RegformView::EventNotFound => vec!["Event not found".to_string()],
        RegformView::RegformNotFound => vec!["Registration form not found".to_string()],
        RegformView::Failed(error) => vec![format!("Failed to read local data: {error}")],
        RegformView::Ready(summary) => {
            let regform = &summary.regform;
            let mut lines = vec![
                format!("{} / {}", summary.event.title, regform.title),
                format!("Indico registration page: {}", summary.management_url),
                format!(
                    "[{}]  {} checked in / {} registered",
                    regform.status_label(),
                    regform.checked_in_count,
                    regform.registration_count
                ),
                String::new(),
            ];
            if let Some(banner) = summary.banner {
                lines.push(banner.message().to_string());
            }
            lines.extend(summary.rows.iter().map(|row| {
                format!(
                    "{:>4}  {} {}",
                    row.id,
                    if row.checked_in { "[x]" } else { "[ ]" },
                    row.full_name
                )
            }));
            lines
        }
    }
}

pub fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Completed { participants } => {
            format!("Sync completed ({participants} participants)")
        }
        SyncOutcome::Skipped(Missing::Event) => "Sync skipped: event is not cached".to_string(),
        SyncOutcome::Skipped(Missing::Regform) => {
            "Sync skipped: registration form is not cached".to_string()
        }
        SyncOutcome::Cancelled { stage } => format!("Sync cancelled during {stage:?} stage"),
        SyncOutcome::Failed { stage, message } => {
            format!("Sync failed during {stage:?} stage: {message}")
        }
    }
}

/// Local date and time of a Unix millisecond timestamp
pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |time| {
            time.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        },
    )
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("CHECKIN_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("checkin").join("checkin.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_store(path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(path.to_path_buf()).await?)
}

pub fn load_config() -> Result<CliConfig, CliError> {
    CliConfig::load().map_err(CliError::Config)
}

/// Cached event and regform, or a not-found error naming what is missing
pub async fn resolve_regform(
    store: &LocalStore,
    event_id: EventId,
    regform_id: RegformId,
) -> Result<(Event, Regform), CliError> {
    let event = store
        .get_event(event_id)
        .await?
        .ok_or(CliError::EventNotFound(event_id))?;
    let regform = store
        .get_regform_in_event(regform_id, event_id)
        .await?
        .ok_or(CliError::RegformNotFound(event_id, regform_id))?;
    Ok((event, regform))
}

pub fn build_gateway(base_url: &str, config: &CliConfig) -> Result<IndicoGateway, CliError> {
    let mut gateway_config = GatewayConfig::default().with_timeout(config.timeout());
    match resolve_token(base_url)? {
        Some((token, source)) => {
            tracing::debug!("Using API token from {source:?} for {base_url}");
            gateway_config = gateway_config.with_token(token);
        }
        None => tracing::debug!("No API token for {base_url}; sending anonymous requests"),
    }
    Ok(IndicoGateway::new(gateway_config)?)
}

pub async fn build_coordinator(
    store: &LocalStore,
    event_id: EventId,
    config: &CliConfig,
) -> Result<Coordinator, CliError> {
    let event = store
        .get_event(event_id)
        .await?
        .ok_or(CliError::EventNotFound(event_id))?;
    let gateway = build_gateway(&event.base_url, config)?;
    Ok(SyncCoordinator::new(store.clone(), gateway, StderrNotifier))
}

/// Map a finished activation to the command's result
pub fn outcome_to_result(outcome: SyncOutcome) -> Result<usize, CliError> {
    match outcome {
        SyncOutcome::Completed { participants } => Ok(participants),
        SyncOutcome::Skipped(_) => Ok(0),
        SyncOutcome::Cancelled { .. } => Err(CliError::SyncCancelled),
        SyncOutcome::Failed { message, .. } => Err(CliError::SyncFailed(message)),
    }
}
