//! Adding an event and registration form to the local cache.
//!
//! Onboarding only records placeholders keyed by the remote identifiers;
//! titles, counts and participants arrive with the first sync.

use crate::models::{EventId, NewEvent, NewRegform, RegformId};
use crate::services::LocalStore;
use crate::util::normalize_base_url;
use crate::{Error, Result};

/// Local identities of an onboarded registration form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Onboarded {
    pub event_id: EventId,
    pub regform_id: RegformId,
    /// Whether the regform was not cached before
    pub created: bool,
}

/// Find or create the local event and regform for a remote pair.
pub async fn register(
    store: &LocalStore,
    server_url: &str,
    event_indico_id: i64,
    regform_indico_id: i64,
) -> Result<Onboarded> {
    let base_url = normalize_base_url(server_url).ok_or_else(|| {
        Error::InvalidInput(format!("Server URL must be http(s): {}", server_url.trim()))
    })?;
    if event_indico_id <= 0 || regform_indico_id <= 0 {
        return Err(Error::InvalidInput(
            "Event and registration form ids must be positive".to_string(),
        ));
    }

    let event = match store.find_event(&base_url, event_indico_id).await? {
        Some(event) => event,
        None => {
            let event = store
                .insert_event(&NewEvent {
                    indico_id: event_indico_id,
                    base_url: base_url.clone(),
                    title: format!("Event {event_indico_id}"),
                })
                .await?;
            tracing::info!("Added event {} from {base_url}", event.indico_id);
            event
        }
    };

    if let Some(regform) = store.find_regform(event.id, regform_indico_id).await? {
        return Ok(Onboarded {
            event_id: event.id,
            regform_id: regform.id,
            created: false,
        });
    }

    let regform = store
        .insert_regform(&NewRegform {
            event_id: event.id,
            indico_id: regform_indico_id,
            title: format!("Registration form {regform_indico_id}"),
        })
        .await?;
    tracing::info!(
        "Added registration form {} to event {}",
        regform.indico_id,
        event.indico_id
    );

    Ok(Onboarded {
        event_id: event.id,
        regform_id: regform.id,
        created: true,
    })
}
