//! Indico check-in API client.

use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{RemoteError, RemoteGateway, RemoteResult};
use crate::models::{Event, Participant, ParticipantRecord, Regform};
use crate::util::{compact_text, normalize_text_option};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// HTTP settings for [`IndicoGateway`]
#[derive(Clone)]
pub struct GatewayConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    pub user_agent: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("GatewayConfig")
            .field("timeout", &self.timeout)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_token: None,
            user_agent: format!("checkin/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = normalize_text_option(Some(token.into()));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`RemoteGateway`] backed by the Indico check-in REST API
#[derive(Clone)]
pub struct IndicoGateway {
    client: reqwest::Client,
    api_token: Option<String>,
}

impl IndicoGateway {
    pub fn new(config: GatewayConfig) -> RemoteResult<Self> {
        if config.timeout.is_zero() {
            return Err(RemoteError::InvalidConfiguration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            api_token: config.api_token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> RemoteResult<T> {
        let request = self.authorized(request);
        cancellable(cancel, async move {
            let response = request.send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Api(parse_api_error(status, &body)));
            }

            let body = response.bytes().await?;
            serde_json::from_slice::<T>(&body)
                .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
        })
        .await
    }
}

impl RemoteGateway for IndicoGateway {
    async fn fetch_event(&self, event: &Event, cancel: &CancellationToken) -> RemoteResult<Event> {
        let url = event_endpoint(event);
        tracing::debug!("Fetching event from {url}");
        let payload: EventPayload = self.send_json(self.client.get(url), cancel).await?;
        Ok(payload.merge_into(event))
    }

    async fn fetch_regform(
        &self,
        event: &Event,
        regform: &Regform,
        cancel: &CancellationToken,
    ) -> RemoteResult<Regform> {
        let url = regform_endpoint(event, regform);
        tracing::debug!("Fetching registration form from {url}");
        let payload: RegformPayload = self.send_json(self.client.get(url), cancel).await?;
        Ok(payload.merge_into(regform))
    }

    async fn fetch_participants(
        &self,
        event: &Event,
        regform: &Regform,
        cancel: &CancellationToken,
    ) -> RemoteResult<Vec<ParticipantRecord>> {
        let url = format!("{}/registrations", regform_endpoint(event, regform));
        tracing::debug!("Fetching participants from {url}");
        let payload: Vec<ParticipantPayload> =
            self.send_json(self.client.get(url), cancel).await?;
        payload.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_checked_in(
        &self,
        event: &Event,
        regform: &Regform,
        participant: &Participant,
        checked_in: bool,
        cancel: &CancellationToken,
    ) -> RemoteResult<ParticipantRecord> {
        let url = format!(
            "{}/{}",
            regform_endpoint(event, regform),
            participant.indico_id
        );
        tracing::debug!("Updating check-in state at {url}");
        let request = self.client.patch(url).json(&CheckinPatch { checked_in });
        let payload: ParticipantPayload = self.send_json(request, cancel).await?;
        payload.try_into()
    }
}

/// Race `future` against `cancel`, preferring cancellation.
async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = RemoteResult<T>>,
) -> RemoteResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RemoteError::Cancelled),
        result = future => result,
    }
}

fn event_endpoint(event: &Event) -> String {
    format!(
        "{}/api/checkin/event/{}/",
        event.base_url.trim_end_matches('/'),
        event.indico_id
    )
}

fn regform_endpoint(event: &Event, regform: &Regform) -> String {
    format!(
        "{}/api/checkin/event/{}/registration/{}",
        event.base_url.trim_end_matches('/'),
        event.indico_id,
        regform.indico_id
    )
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    title: String,
}

impl EventPayload {
    fn merge_into(self, cached: &Event) -> Event {
        Event {
            title: self.title,
            ..cached.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegformPayload {
    title: String,
    #[serde(default)]
    is_open: bool,
    #[serde(default)]
    registration_count: i64,
    #[serde(default)]
    checked_in_count: i64,
}

impl RegformPayload {
    fn merge_into(self, cached: &Regform) -> Regform {
        Regform {
            title: self.title,
            is_open: self.is_open,
            registration_count: self.registration_count,
            checked_in_count: self.checked_in_count,
            ..cached.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParticipantPayload {
    id: i64,
    full_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    checked_in: bool,
    #[serde(default)]
    checked_in_dt: Option<String>,
}

impl TryFrom<ParticipantPayload> for ParticipantRecord {
    type Error = RemoteError;

    fn try_from(value: ParticipantPayload) -> RemoteResult<Self> {
        let checked_in_at = value
            .checked_in_dt
            .and_then(|raw| normalize_text_option(Some(raw)))
            .map(|raw| {
                chrono::DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.timestamp_millis())
                    .map_err(|error| {
                        RemoteError::InvalidPayload(format!(
                            "invalid checked_in_dt '{raw}' for registration {}: {error}",
                            value.id
                        ))
                    })
            })
            .transpose()?;

        Ok(Self {
            indico_id: value.id,
            full_name: value.full_name.trim().to_string(),
            email: normalize_text_option(value.email),
            checked_in: value.checked_in,
            checked_in_at,
        })
    }
}

#[derive(Debug, Serialize)]
struct CheckinPatch {
    checked_in: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
