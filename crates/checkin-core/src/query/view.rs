//! Registration form page model.

use tokio::sync::watch;

use super::{EventQuery, LiveQuery, ParticipantsQuery, QueryState, RegformQuery};
use crate::models::{Event, EventId, Participant, ParticipantId, Regform, RegformId};
use crate::routes::Route;
use crate::services::LocalStore;

/// Banner shown in place of an empty participant list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantsBanner {
    Updating,
    Empty,
}

impl ParticipantsBanner {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Updating => "Updating participants..",
            Self::Empty => "There are no registered participants",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub id: ParticipantId,
    pub full_name: String,
    pub checked_in: bool,
    pub route: Route,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegformSummary {
    pub event: Event,
    pub regform: Regform,
    pub management_url: String,
    pub rows: Vec<ParticipantRow>,
    pub banner: Option<ParticipantsBanner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegformView {
    Loading,
    EventNotFound,
    RegformNotFound,
    Ready(Box<RegformSummary>),
    Failed(String),
}

impl RegformView {
    /// Combine the page's query states with the syncing flag
    pub fn compose(
        event: &QueryState<Event>,
        regform: &QueryState<Regform>,
        participants: &QueryState<Vec<Participant>>,
        syncing: bool,
    ) -> Self {
        if event.is_loading() || regform.is_loading() || participants.is_loading() {
            return Self::Loading;
        }

        let event = match event {
            QueryState::Present(event) => event,
            QueryState::Failed(error) => return Self::Failed(error.clone()),
            _ => return Self::EventNotFound,
        };
        let regform = match regform {
            QueryState::Present(regform) => regform,
            QueryState::Failed(error) => return Self::Failed(error.clone()),
            _ => return Self::RegformNotFound,
        };
        let participants = match participants {
            QueryState::Present(participants) => participants.as_slice(),
            QueryState::Failed(error) => return Self::Failed(error.clone()),
            _ => &[],
        };

        let banner = match (participants.is_empty(), syncing) {
            (true, true) => Some(ParticipantsBanner::Updating),
            (true, false) => Some(ParticipantsBanner::Empty),
            (false, _) => None,
        };
        let rows = participants
            .iter()
            .map(|participant| ParticipantRow {
                id: participant.id,
                full_name: participant.full_name.clone(),
                checked_in: participant.checked_in,
                route: Route::Participant(event.id, regform.id, participant.id),
            })
            .collect();

        Self::Ready(Box::new(RegformSummary {
            management_url: regform.management_url(event),
            event: event.clone(),
            regform: regform.clone(),
            rows,
            banner,
        }))
    }
}

/// Live model of one registration form page.
///
/// Holds the event, regform and participant queries plus the coordinator's
/// syncing flag; [`RegformPage::changed`] resolves whenever any of them
/// publishes.
pub struct RegformPage {
    event: LiveQuery<Event>,
    regform: LiveQuery<Regform>,
    participants: LiveQuery<Vec<Participant>>,
    syncing: watch::Receiver<bool>,
    syncing_open: bool,
}

impl RegformPage {
    pub fn open(
        store: &LocalStore,
        event_id: EventId,
        regform_id: RegformId,
        syncing: watch::Receiver<bool>,
    ) -> Self {
        Self {
            event: LiveQuery::spawn(store.clone(), EventQuery(event_id)),
            regform: LiveQuery::spawn(
                store.clone(),
                RegformQuery {
                    event_id,
                    regform_id,
                },
            ),
            participants: LiveQuery::spawn(store.clone(), ParticipantsQuery(regform_id)),
            syncing,
            syncing_open: true,
        }
    }

    pub fn view(&self) -> RegformView {
        RegformView::compose(
            &self.event.state(),
            &self.regform.state(),
            &self.participants.state(),
            *self.syncing.borrow(),
        )
    }

    /// Wait until any input changes, then return the recomposed view
    pub async fn changed(&mut self) -> RegformView {
        let syncing_open = self.syncing_open;
        let syncing_closed = tokio::select! {
            _ = self.event.changed() => false,
            _ = self.regform.changed() => false,
            _ = self.participants.changed() => false,
            result = self.syncing.changed(), if syncing_open => result.is_err(),
        };
        if syncing_closed {
            // Coordinator gone; the flag keeps its last value
            self.syncing_open = false;
        }
        self.view()
    }

    /// Wait until the view satisfies `predicate`
    pub async fn wait_until(
        &mut self,
        mut predicate: impl FnMut(&RegformView) -> bool,
    ) -> RegformView {
        let mut view = self.view();
        while !predicate(&view) {
            view = self.changed().await;
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, NewRegform, ParticipantRecord};
    use pretty_assertions::assert_eq;

    fn event() -> Event {
        Event {
            id: EventId::new(1),
            indico_id: 42,
            base_url: "https://indico.example.org".to_string(),
            title: "Conference".to_string(),
        }
    }

    fn regform() -> Regform {
        Regform {
            id: RegformId::new(2),
            event_id: EventId::new(1),
            indico_id: 7,
            title: "Participants".to_string(),
            is_open: true,
            registration_count: 1,
            checked_in_count: 0,
        }
    }

    fn participant(id: i64, name: &str) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            regform_id: RegformId::new(2),
            indico_id: id * 100,
            full_name: name.to_string(),
            email: None,
            checked_in: id % 2 == 0,
            checked_in_at: None,
        }
    }

    #[test]
    fn pending_input_is_loading() {
        let view = RegformView::compose(
            &QueryState::Present(event()),
            &QueryState::Pending,
            &QueryState::Present(Vec::new()),
            false,
        );
        assert_eq!(view, RegformView::Loading);
    }

    #[test]
    fn missing_event_wins_over_missing_regform() {
        let view = RegformView::compose(
            &QueryState::Absent,
            &QueryState::Absent,
            &QueryState::Present(Vec::new()),
            false,
        );
        assert_eq!(view, RegformView::EventNotFound);

        let view = RegformView::compose(
            &QueryState::Present(event()),
            &QueryState::Absent,
            &QueryState::Present(Vec::new()),
            false,
        );
        assert_eq!(view, RegformView::RegformNotFound);
    }

    #[test]
    fn empty_list_banner_follows_syncing_flag() {
        let banner = |syncing| match RegformView::compose(
            &QueryState::Present(event()),
            &QueryState::Present(regform()),
            &QueryState::Present(Vec::new()),
            syncing,
        ) {
            RegformView::Ready(summary) => summary.banner,
            other => panic!("unexpected view: {other:?}"),
        };

        assert_eq!(banner(true), Some(ParticipantsBanner::Updating));
        assert_eq!(banner(false), Some(ParticipantsBanner::Empty));
    }

    #[test]
    fn ready_view_has_rows_and_management_link() {
        let view = RegformView::compose(
            &QueryState::Present(event()),
            &QueryState::Present(regform()),
            &QueryState::Present(vec![participant(3, "Ada"), participant(4, "Zoe")]),
            true,
        );

        let RegformView::Ready(summary) = view else {
            panic!("expected ready view");
        };
        assert_eq!(summary.banner, None);
        assert_eq!(
            summary.management_url,
            "https://indico.example.org/event/42/manage/registration/7"
        );
        assert_eq!(
            summary.rows,
            vec![
                ParticipantRow {
                    id: ParticipantId::new(3),
                    full_name: "Ada".to_string(),
                    checked_in: false,
                    route: Route::Participant(
                        EventId::new(1),
                        RegformId::new(2),
                        ParticipantId::new(3),
                    ),
                },
                ParticipantRow {
                    id: ParticipantId::new(4),
                    full_name: "Zoe".to_string(),
                    checked_in: true,
                    route: Route::Participant(
                        EventId::new(1),
                        RegformId::new(2),
                        ParticipantId::new(4),
                    ),
                },
            ]
        );
        assert_eq!(summary.rows[0].route.to_string(), "/event/1/2/3");
    }

    #[test]
    fn read_failure_is_surfaced() {
        let view = RegformView::compose(
            &QueryState::Failed("store is closed".to_string()),
            &QueryState::Present(regform()),
            &QueryState::Present(Vec::new()),
            false,
        );
        assert_eq!(view, RegformView::Failed("store is closed".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn page_tracks_store_and_syncing_flag() {
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
        let (syncing_tx, syncing_rx) = watch::channel(true);

        let mut page = RegformPage::open(&store, event.id, regform.id, syncing_rx);
        let view = page
            .wait_until(|view| !matches!(view, RegformView::Loading))
            .await;
        let RegformView::Ready(summary) = view else {
            panic!("expected ready view");
        };
        assert_eq!(summary.banner, Some(ParticipantsBanner::Updating));

        store
            .upsert_participants(
                regform.id,
                &[ParticipantRecord {
                    indico_id: 1,
                    full_name: "Ada Lovelace".to_string(),
                    email: None,
                    checked_in: false,
                    checked_in_at: None,
                }],
            )
            .await
            .unwrap();
        syncing_tx.send_replace(false);

        let view = page
            .wait_until(|view| {
                matches!(view, RegformView::Ready(summary) if summary.rows.len() == 1)
            })
            .await;
        let RegformView::Ready(summary) = view else {
            unreachable!();
        };
        assert_eq!(summary.rows[0].full_name, "Ada Lovelace");
        assert_eq!(summary.banner, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn page_for_foreign_regform_is_not_found() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let first = store
            .insert_event(&NewEvent {
                indico_id: 1,
                base_url: "https://indico.example.org".to_string(),
                title: "First".to_string(),
            })
            .await
            .unwrap();
        let second = store
            .insert_event(&NewEvent {
                indico_id: 2,
                base_url: "https://indico.example.org".to_string(),
                title: "Second".to_string(),
            })
            .await
            .unwrap();
        let regform = store
            .insert_regform(&NewRegform {
                event_id: second.id,
                indico_id: 7,
                title: "Participants".to_string(),
            })
            .await
            .unwrap();
        let (_syncing_tx, syncing_rx) = watch::channel(false);

        let mut page = RegformPage::open(&store, first.id, regform.id, syncing_rx);
        let view = page
            .wait_until(|view| !matches!(view, RegformView::Loading))
            .await;
        assert_eq!(view, RegformView::RegformNotFound);
    }
}
