use std::io;

use checkin_core::remote::RemoteError;
use checkin_core::{EventId, RegformId};
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] checkin_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No server given. Pass --server or run `checkin config set --server <URL>`.")]
    NoServer,
    #[error("Event {0} is not cached. Run `checkin add` first.")]
    EventNotFound(EventId),
    #[error("Registration form {1} is not cached for event {0}")]
    RegformNotFound(EventId, RegformId),
    #[error("Failed to read local data: {0}")]
    LocalRead(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("Sync was cancelled")]
    SyncCancelled,
}
