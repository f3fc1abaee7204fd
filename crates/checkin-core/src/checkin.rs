//! Participant check-in workflow.

use tokio_util::sync::CancellationToken;

use crate::models::{EventId, Participant, ParticipantId, RegformId};
use crate::remote::RemoteGateway;
use crate::services::LocalStore;
use crate::{Error, Result};

/// Pushes check-in changes to the server, then mirrors the server's answer
/// into the local store.
pub struct CheckinService<G> {
    store: LocalStore,
    gateway: G,
}

impl<G: RemoteGateway> CheckinService<G> {
    pub const fn new(store: LocalStore, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// Set a participant's check-in state.
    ///
    /// The local row is only touched after the server accepted the change.
    pub async fn set_checked_in(
        &self,
        event_id: EventId,
        regform_id: RegformId,
        participant_id: ParticipantId,
        checked_in: bool,
        cancel: &CancellationToken,
    ) -> Result<Participant> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Event {event_id}")))?;
        let regform = self
            .store
            .get_regform_in_event(regform_id, event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Registration form {regform_id}")))?;
        let participant = self
            .store
            .get_participant(participant_id)
            .await?
            .filter(|participant| participant.regform_id == regform.id)
            .ok_or_else(|| Error::NotFound(format!("Participant {participant_id}")))?;

        if participant.checked_in == checked_in {
            tracing::debug!(
                "Participant {participant_id} already has checked_in={checked_in}; pushing anyway"
            );
        }

        let record = self
            .gateway
            .set_checked_in(&event, &regform, &participant, checked_in, cancel)
            .await?;

        if record.indico_id != participant.indico_id {
            return Err(Error::InvalidInput(format!(
                "Server answered for participant {} instead of {}",
                record.indico_id, participant.indico_id
            )));
        }

        self.store
            .upsert_participants(regform.id, std::slice::from_ref(&record))
            .await?;
        tracing::info!(
            "Participant {participant_id} ({}) checked_in={}",
            participant.full_name,
            record.checked_in
        );

        self.store
            .get_participant(participant_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Participant {participant_id}")))
    }

    pub async fn check_in(
        &self,
        event_id: EventId,
        regform_id: RegformId,
        participant_id: ParticipantId,
        cancel: &CancellationToken,
    ) -> Result<Participant> {
        self.set_checked_in(event_id, regform_id, participant_id, true, cancel)
            .await
    }

    pub async fn undo_check_in(
        &self,
        event_id: EventId,
        regform_id: RegformId,
        participant_id: ParticipantId,
        cancel: &CancellationToken,
    ) -> Result<Participant> {
        self.set_checked_in(event_id, regform_id, participant_id, false, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, NewEvent, NewRegform, ParticipantRecord, Regform};
    use crate::sync::testing::FakeGateway;
    use pretty_assertions::assert_eq;

    async fn seeded() -> (LocalStore, Event, Regform, Participant) {
        let store = LocalStore::open_in_memory().await.unwrap();
        let event = store
            .insert_event(&NewEvent {
                indico_id: 42,
                base_url: "https://indico.example.org".to_string(),
                title: "Conference".to_string(),
            })
            .await
            .unwrap();
        let regform = store
            .insert_regform(&NewRegform {
                event_id: event.id,
                indico_id: 7,
                title: "Participants".to_string(),
            })
            .await
            .unwrap();
        store
            .upsert_participants(
                regform.id,
                &[ParticipantRecord {
                    indico_id: 100,
                    full_name: "Ada Lovelace".to_string(),
                    email: Some("ada@example.org".to_string()),
                    checked_in: false,
                    checked_in_at: None,
                }],
            )
            .await
            .unwrap();
        let participant = store.list_participants(regform.id).await.unwrap().remove(0);
        (store, event, regform, participant)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn accepted_check_in_updates_local_row() {
        let (store, event, regform, participant) = seeded().await;
        let gateway = FakeGateway::new(None, None, Some(Vec::new()));
        let service = CheckinService::new(store.clone(), gateway);

        let updated = service
            .check_in(event.id, regform.id, participant.id, &CancellationToken::new())
            .await
            .unwrap();

        assert!(updated.checked_in);
        assert_eq!(updated.checked_in_at, Some(1_700_000_000_000));
        assert_eq!(updated.id, participant.id);
        assert_eq!(store.count_checked_in(regform.id).await.unwrap(), 1);

        let reverted = service
            .undo_check_in(event.id, regform.id, participant.id, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!reverted.checked_in);
        assert_eq!(reverted.checked_in_at, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_check_in_leaves_store_untouched() {
        let (store, event, regform, participant) = seeded().await;
        let gateway = FakeGateway::new(None, None, None);
        let service = CheckinService::new(store.clone(), gateway.clone());

        let result = service
            .check_in(event.id, regform.id, participant.id, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::Remote(_))));
        assert_eq!(gateway.calls(), 1);
        assert_eq!(
            store.get_participant(participant.id).await.unwrap(),
            Some(participant)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn participant_outside_regform_is_not_found() {
        let (store, event, _, participant) = seeded().await;
        let other = store
            .insert_regform(&NewRegform {
                event_id: event.id,
                indico_id: 8,
                title: "Staff".to_string(),
            })
            .await
            .unwrap();
        let gateway = FakeGateway::new(None, None, Some(Vec::new()));
        let service = CheckinService::new(store, gateway.clone());

        let result = service
            .check_in(event.id, other.id, participant.id, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(gateway.calls(), 0);
    }
}
