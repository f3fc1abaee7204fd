//! Live queries over the local store.
//!
//! A [`LiveQuery`] runs a [`Query`] once, then again after every committed
//! change to a table the query depends on, and publishes each result on a
//! `watch` channel. Consumers never re-issue the query themselves.

mod view;

use std::future::Future;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::models::{Event, EventId, Participant, Regform, RegformId};
use crate::services::{LocalStore, Table};
use crate::Result;

pub use view::{ParticipantRow, ParticipantsBanner, RegformPage, RegformSummary, RegformView};

/// Observable state of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    /// The first read has not resolved yet
    Pending,
    /// The read resolved and found nothing
    Absent,
    /// The read resolved with a value; collections may be empty
    Present(T),
    /// The read failed
    Failed(String),
}

impl<T> QueryState<T> {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub const fn has_value(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }

    fn from_result(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Present(value),
            Ok(None) => Self::Absent,
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}

/// A read against the local store
pub trait Query: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Tables whose changes invalidate this query
    fn depends_on(&self) -> &'static [Table];

    /// `Ok(None)` means "resolved, nothing found"
    fn run(&self, store: &LocalStore) -> impl Future<Output = Result<Option<Self::Output>>> + Send;
}

/// A single event by id
#[derive(Debug, Clone, Copy)]
pub struct EventQuery(pub EventId);

impl Query for EventQuery {
    type Output = Event;

    fn depends_on(&self) -> &'static [Table] {
        &[Table::Events]
    }

    async fn run(&self, store: &LocalStore) -> Result<Option<Event>> {
        store.get_event(self.0).await
    }
}

/// A registration form, only if it belongs to the given event
#[derive(Debug, Clone, Copy)]
pub struct RegformQuery {
    pub event_id: EventId,
    pub regform_id: RegformId,
}

impl Query for RegformQuery {
    type Output = Regform;

    fn depends_on(&self) -> &'static [Table] {
        &[Table::Regforms]
    }

    async fn run(&self, store: &LocalStore) -> Result<Option<Regform>> {
        store
            .get_regform_in_event(self.regform_id, self.event_id)
            .await
    }
}

/// Participants of a registration form, sorted by full name
#[derive(Debug, Clone, Copy)]
pub struct ParticipantsQuery(pub RegformId);

impl Query for ParticipantsQuery {
    type Output = Vec<Participant>;

    fn depends_on(&self) -> &'static [Table] {
        &[Table::Participants]
    }

    async fn run(&self, store: &LocalStore) -> Result<Option<Vec<Participant>>> {
        store.list_participants(self.0).await.map(Some)
    }
}

/// Every cached event
#[derive(Debug, Clone, Copy)]
pub struct EventsQuery;

impl Query for EventsQuery {
    type Output = Vec<Event>;

    fn depends_on(&self) -> &'static [Table] {
        &[Table::Events]
    }

    async fn run(&self, store: &LocalStore) -> Result<Option<Vec<Event>>> {
        store.list_events().await.map(Some)
    }
}

/// Registration forms of an event
#[derive(Debug, Clone, Copy)]
pub struct RegformsQuery(pub EventId);

impl Query for RegformsQuery {
    type Output = Vec<Regform>;

    fn depends_on(&self) -> &'static [Table] {
        &[Table::Regforms]
    }

    async fn run(&self, store: &LocalStore) -> Result<Option<Vec<Regform>>> {
        store.list_regforms(self.0).await.map(Some)
    }
}

/// Handle to a running live query. Dropping it stops the query.
pub struct LiveQuery<T> {
    state: watch::Receiver<QueryState<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone + Send + Sync + 'static> LiveQuery<T> {
    /// Start evaluating `query` against `store`. Must be called within a
    /// Tokio runtime.
    pub fn spawn<Q>(store: LocalStore, query: Q) -> Self
    where
        Q: Query<Output = T>,
    {
        let (tx, state) = watch::channel(QueryState::Pending);
        // Subscribe before the first read so no change can slip in between
        let changes = store.subscribe();
        let task = tokio::spawn(evaluate(store, query, tx, changes));
        Self { state, task }
    }

    /// Latest published state
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Wait for the next publication and return it
    pub async fn changed(&mut self) -> QueryState<T> {
        if self.state.changed().await.is_err() {
            tracing::debug!("Live query task stopped");
        }
        self.state.borrow_and_update().clone()
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_until(
        &mut self,
        mut predicate: impl FnMut(&QueryState<T>) -> bool,
    ) -> QueryState<T> {
        let matched = match self.state.wait_for(|state| predicate(state)).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        matched.unwrap_or_else(|| self.state.borrow().clone())
    }

    /// An independent receiver for the same query
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.clone()
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn evaluate<Q: Query>(
    store: LocalStore,
    query: Q,
    tx: watch::Sender<QueryState<Q::Output>>,
    mut changes: broadcast::Receiver<crate::services::TableChange>,
) {
    let tables = query.depends_on();

    loop {
        let state = QueryState::from_result(query.run(&store).await);
        if let QueryState::Failed(error) = &state {
            tracing::warn!("Live query read failed: {error}");
        }
        // Publish even unchanged results so every mutation re-emits
        tx.send_replace(state);

        loop {
            match changes.recv().await {
                Ok(change) if tables.contains(&change.table) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Live query lagged by {skipped} changes; re-reading");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }

        if tx.is_closed() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RegformRemoval;
    use crate::models::{NewEvent, NewRegform, ParticipantRecord};
    use pretty_assertions::assert_eq;

    async fn seeded() -> (LocalStore, Event, Regform) {
        let store = LocalStore::open_in_memory().await.unwrap();
        let event = store
            .insert_event(&NewEvent {
                indico_id: 1,
                base_url: "https://indico.example.org".to_string(),
                title: "Conference".to_string(),
            })
            .await
            .unwrap();
        let regform = store
            .insert_regform(&NewRegform {
                event_id: event.id,
                indico_id: 10,
                title: "Participants".to_string(),
            })
            .await
            .unwrap();
        (store, event, regform)
    }

    fn record(indico_id: i64, name: &str) -> ParticipantRecord {
        ParticipantRecord {
            indico_id,
            full_name: name.to_string(),
            email: None,
            checked_in: false,
            checked_in_at: None,
        }
    }

    fn names(state: &QueryState<Vec<Participant>>) -> Vec<String> {
        state
            .value()
            .map(|participants| participants.iter().map(|p| p.full_name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn query_state_helpers() {
        let pending: QueryState<u8> = QueryState::Pending;
        assert!(pending.is_loading());
        assert!(!pending.has_value());
        assert_eq!(QueryState::Present(3).value(), Some(&3));
        assert_eq!(QueryState::<u8>::Absent.value(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_collection_is_present_not_absent() {
        let (store, _, regform) = seeded().await;
        let mut live = LiveQuery::spawn(store, ParticipantsQuery(regform.id));

        let state = live.wait_until(|state| !state.is_loading()).await;
        assert_eq!(state, QueryState::Present(Vec::new()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_entity_resolves_absent() {
        let (store, event, _) = seeded().await;
        let mut live = LiveQuery::spawn(
            store,
            RegformQuery {
                event_id: event.id,
                regform_id: RegformId::new(404),
            },
        );

        let state = live.wait_until(|state| !state.is_loading()).await;
        assert_eq!(state, QueryState::Absent);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn participant_upsert_re_emits_sorted_list() {
        let (store, _, regform) = seeded().await;
        let mut live = LiveQuery::spawn(store.clone(), ParticipantsQuery(regform.id));
        live.wait_until(QueryState::has_value).await;

        store
            .upsert_participants(regform.id, &[record(1, "Zoe"), record(2, "Ada")])
            .await
            .unwrap();

        let state = live.wait_until(|state| names(state).len() == 2).await;
        assert_eq!(names(&state), vec!["Ada", "Zoe"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn participant_write_re_emits_without_requery() {
        let (store, _, regform) = seeded().await;
        store
            .upsert_participants(regform.id, &[record(1, "Ada")])
            .await
            .unwrap();
        let mut live = LiveQuery::spawn(store.clone(), ParticipantsQuery(regform.id));
        live.wait_until(|state| names(state).len() == 1).await;
        let mut receiver = live.subscribe();
        receiver.borrow_and_update();

        // Identical data still re-emits
        store
            .upsert_participants(regform.id, &[record(1, "Ada")])
            .await
            .unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(names(&receiver.borrow_and_update()), vec!["Ada"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn regform_delete_re_emits_absent() {
        let (store, event, regform) = seeded().await;
        let mut live = LiveQuery::spawn(
            store.clone(),
            RegformQuery {
                event_id: event.id,
                regform_id: regform.id,
            },
        );
        live.wait_until(QueryState::has_value).await;

        store
            .delete_regform(regform.id, RegformRemoval::KeepParticipants)
            .await
            .unwrap();

        let state = live
            .wait_until(|state| matches!(state, QueryState::Absent))
            .await;
        assert_eq!(state, QueryState::Absent);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn participant_delete_re_emits() {
        let (store, _, regform) = seeded().await;
        store
            .upsert_participants(regform.id, &[record(1, "Ada"), record(2, "Bob")])
            .await
            .unwrap();
        let mut live = LiveQuery::spawn(store.clone(), ParticipantsQuery(regform.id));
        live.wait_until(|state| names(state).len() == 2).await;

        store
            .delete_regform(regform.id, RegformRemoval::CascadeParticipants)
            .await
            .unwrap();

        let state = live.wait_until(|state| names(state).is_empty()).await;
        assert_eq!(state, QueryState::Present(Vec::new()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unrelated_tables_do_not_trigger_reads() {
        let (store, event, regform) = seeded().await;
        let mut live = LiveQuery::spawn(store.clone(), EventQuery(event.id));
        live.wait_until(QueryState::has_value).await;
        let mut receiver = live.subscribe();
        receiver.borrow_and_update();

        store
            .upsert_participants(regform.id, &[record(1, "Ada")])
            .await
            .unwrap();
        let mut renamed = event.clone();
        renamed.title = "Renamed".to_string();
        store.upsert_event(&renamed).await.unwrap();

        receiver.changed().await.unwrap();
        let state = receiver.borrow_and_update().clone();
        assert_eq!(state, QueryState::Present(renamed));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_store_reports_failure() {
        let (store, _, _) = seeded().await;
        store.close().await;

        let mut live = LiveQuery::spawn(store, EventsQuery);
        let state = live.wait_until(|state| !state.is_loading()).await;
        assert!(matches!(state, QueryState::Failed(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn regforms_query_lists_new_forms() {
        let (store, event, _) = seeded().await;
        let mut live = LiveQuery::spawn(store.clone(), RegformsQuery(event.id));
        live.wait_until(|state| state.value().is_some_and(|forms| forms.len() == 1))
            .await;

        store
            .insert_regform(&NewRegform {
                event_id: event.id,
                indico_id: 11,
                title: "Accompanying persons".to_string(),
            })
            .await
            .unwrap();

        let state = live
            .wait_until(|state| state.value().is_some_and(|forms| forms.len() == 2))
            .await;
        let titles: Vec<String> = state
            .value()
            .unwrap()
            .iter()
            .map(|form| form.title.clone())
            .collect();
        assert_eq!(titles, vec!["Accompanying persons", "Participants"]);
    }
}
