//! Remote gateway contract and the Indico HTTP implementation.

mod indico;

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{Event, Participant, ParticipantRecord, Regform};

pub use indico::{GatewayConfig, IndicoGateway};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server error: {0}")]
    Api(String),
    #[error("Invalid server payload: {0}")]
    InvalidPayload(String),
    #[error("Request cancelled")]
    Cancelled,
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Authoritative source of events, registration forms and participants.
///
/// Every call receives the locally cached (possibly stale) entities for
/// identifiers and URLs, plus the activation's cancellation token.
/// Implementations should stop as soon as the token is cancelled.
pub trait RemoteGateway: Send + Sync {
    fn fetch_event(
        &self,
        event: &Event,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RemoteResult<Event>> + Send;

    fn fetch_regform(
        &self,
        event: &Event,
        regform: &Regform,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RemoteResult<Regform>> + Send;

    fn fetch_participants(
        &self,
        event: &Event,
        regform: &Regform,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RemoteResult<Vec<ParticipantRecord>>> + Send;

    /// Push a participant's check-in state and return the server's view of it
    fn set_checked_in(
        &self,
        event: &Event,
        regform: &Regform,
        participant: &Participant,
        checked_in: bool,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RemoteResult<ParticipantRecord>> + Send;
}
