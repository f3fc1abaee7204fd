//! Local store: the shared, observable handle over the libSQL cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, MappedMutexGuard, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::db::{
    Database, EventRepository, LibSqlEventRepository, LibSqlParticipantRepository,
    LibSqlRegformRepository, ParticipantRepository, RegformRemoval, RegformRepository,
};
use crate::models::{
    Event, EventId, NewEvent, NewRegform, Participant, ParticipantId, ParticipantRecord, Regform,
    RegformId,
};
use crate::{Error, Result};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Tables published on the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Events,
    Regforms,
    Participants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Upsert,
    Delete,
}

/// A committed mutation.
///
/// `key` is the primary key of the affected row, except for participant
/// batch writes and cascades where it is the owning regform id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableChange {
    pub table: Table,
    pub kind: ChangeKind,
    pub key: i64,
}

impl TableChange {
    const fn upsert(table: Table, key: i64) -> Self {
        Self {
            table,
            kind: ChangeKind::Upsert,
            key,
        }
    }

    const fn delete(table: Table, key: i64) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            key,
        }
    }
}

/// Result of a write guarded by an activation token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedWrite {
    Committed,
    /// The token was cancelled; nothing was written
    Cancelled,
    /// The target row was removed locally; nothing was written
    Gone,
}

/// Thread-safe handle for cached events, registration forms and participants.
///
/// Writes are serialized through a single connection; each one commits
/// atomically and is then published to every [`LocalStore::subscribe`]r.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Option<Database>>>,
    db_path: Option<PathBuf>,
    changes: broadcast::Sender<TableChange>,
}

impl LocalStore {
    /// Open a store backed by a database file, creating it if needed.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::info!("Opened local store at {}", db_path.display());
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db, None))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db: Arc::new(Mutex::new(Some(db))),
            db_path,
            changes,
        }
    }

    /// Close the underlying connection. Later operations fail.
    pub async fn close(&self) {
        let mut db = self.db.lock().await;
        if db.take().is_some() {
            tracing::debug!("Closed local store");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.db.lock().await.is_some()
    }

    /// Location of the database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Receive every committed mutation from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.changes.subscribe()
    }

    async fn database(&self) -> Result<MappedMutexGuard<'_, Database>> {
        let guard = self.db.lock().await;
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| Error::Database("store is closed".to_string()))
    }

    fn publish(&self, change: TableChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let db = self.database().await?;
        LibSqlEventRepository::new(db.connection()).get(id).await
    }

    pub async fn find_event(&self, base_url: &str, indico_id: i64) -> Result<Option<Event>> {
        let db = self.database().await?;
        LibSqlEventRepository::new(db.connection())
            .find(base_url, indico_id)
            .await
    }

    pub async fn list_events(&self) -> Result<Vec<Event>> {
        let db = self.database().await?;
        LibSqlEventRepository::new(db.connection()).list().await
    }

    pub async fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        let db = self.database().await?;
        let event = LibSqlEventRepository::new(db.connection())
            .insert(event)
            .await?;
        drop(db);
        self.publish(TableChange::upsert(Table::Events, event.id.get()));
        Ok(event)
    }

    pub async fn upsert_event(&self, event: &Event) -> Result<()> {
        let db = self.database().await?;
        LibSqlEventRepository::new(db.connection())
            .upsert(event)
            .await?;
        drop(db);
        self.publish(TableChange::upsert(Table::Events, event.id.get()));
        Ok(())
    }

    /// Overwrite a cached event unless `cancel` fired.
    ///
    /// The token is checked under the write lock. An event that is no longer
    /// cached is not recreated.
    pub async fn update_event_unless_cancelled(
        &self,
        event: &Event,
        cancel: &CancellationToken,
    ) -> Result<GuardedWrite> {
        let db = self.database().await?;
        if cancel.is_cancelled() {
            return Ok(GuardedWrite::Cancelled);
        }
        if !LibSqlEventRepository::new(db.connection())
            .update(event)
            .await?
        {
            return Ok(GuardedWrite::Gone);
        }
        drop(db);
        self.publish(TableChange::upsert(Table::Events, event.id.get()));
        Ok(GuardedWrite::Committed)
    }

    // ---------------------------------------------------------------------
    // Registration forms
    // ---------------------------------------------------------------------

    pub async fn get_regform(&self, id: RegformId) -> Result<Option<Regform>> {
        let db = self.database().await?;
        LibSqlRegformRepository::new(db.connection()).get(id).await
    }

    pub async fn get_regform_in_event(
        &self,
        id: RegformId,
        event_id: EventId,
    ) -> Result<Option<Regform>> {
        let db = self.database().await?;
        LibSqlRegformRepository::new(db.connection())
            .get_in_event(id, event_id)
            .await
    }

    pub async fn find_regform(&self, event_id: EventId, indico_id: i64) -> Result<Option<Regform>> {
        let db = self.database().await?;
        LibSqlRegformRepository::new(db.connection())
            .find(event_id, indico_id)
            .await
    }

    pub async fn list_regforms(&self, event_id: EventId) -> Result<Vec<Regform>> {
        let db = self.database().await?;
        LibSqlRegformRepository::new(db.connection())
            .list(event_id)
            .await
    }

    pub async fn insert_regform(&self, regform: &NewRegform) -> Result<Regform> {
        let db = self.database().await?;
        let regform = LibSqlRegformRepository::new(db.connection())
            .insert(regform)
            .await?;
        drop(db);
        self.publish(TableChange::upsert(Table::Regforms, regform.id.get()));
        Ok(regform)
    }

    pub async fn upsert_regform(&self, regform: &Regform) -> Result<()> {
        let db = self.database().await?;
        LibSqlRegformRepository::new(db.connection())
            .upsert(regform)
            .await?;
        drop(db);
        self.publish(TableChange::upsert(Table::Regforms, regform.id.get()));
        Ok(())
    }

    /// See [`LocalStore::update_event_unless_cancelled`].
    pub async fn update_regform_unless_cancelled(
        &self,
        regform: &Regform,
        cancel: &CancellationToken,
    ) -> Result<GuardedWrite> {
        let db = self.database().await?;
        if cancel.is_cancelled() {
            return Ok(GuardedWrite::Cancelled);
        }
        if !LibSqlRegformRepository::new(db.connection())
            .update(regform)
            .await?
        {
            return Ok(GuardedWrite::Gone);
        }
        drop(db);
        self.publish(TableChange::upsert(Table::Regforms, regform.id.get()));
        Ok(GuardedWrite::Committed)
    }

    /// Remove a registration form locally. Removing an absent form is a no-op.
    ///
    /// Nothing is sent to the remote server.
    pub async fn delete_regform(&self, id: RegformId, removal: RegformRemoval) -> Result<bool> {
        let db = self.database().await?;
        let removed = LibSqlRegformRepository::new(db.connection())
            .delete(id, removal)
            .await?;
        drop(db);

        if removed {
            tracing::info!("Removed registration form {id} ({removal:?})");
            self.publish(TableChange::delete(Table::Regforms, id.get()));
            if removal == RegformRemoval::CascadeParticipants {
                self.publish(TableChange::delete(Table::Participants, id.get()));
            }
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------------
    // Participants
    // ---------------------------------------------------------------------

    pub async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        let db = self.database().await?;
        LibSqlParticipantRepository::new(db.connection())
            .get(id)
            .await
    }

    /// Participants of a registration form, sorted by full name then id.
    pub async fn list_participants(&self, regform_id: RegformId) -> Result<Vec<Participant>> {
        let db = self.database().await?;
        LibSqlParticipantRepository::new(db.connection())
            .list(regform_id)
            .await
    }

    pub async fn upsert_participants(
        &self,
        regform_id: RegformId,
        records: &[ParticipantRecord],
    ) -> Result<()> {
        let db = self.database().await?;
        LibSqlParticipantRepository::new(db.connection())
            .upsert_many(regform_id, records)
            .await?;
        drop(db);
        self.publish(TableChange::upsert(Table::Participants, regform_id.get()));
        Ok(())
    }

    /// Make `records` the cached participant set of a registration form,
    /// unless `cancel` fired or the form was removed.
    ///
    /// Participants whose remote id is absent from `records` are dropped in
    /// the same transaction.
    pub async fn replace_participants_unless_cancelled(
        &self,
        regform_id: RegformId,
        records: &[ParticipantRecord],
        cancel: &CancellationToken,
    ) -> Result<GuardedWrite> {
        let db = self.database().await?;
        if cancel.is_cancelled() {
            return Ok(GuardedWrite::Cancelled);
        }
        if LibSqlRegformRepository::new(db.connection())
            .get(regform_id)
            .await?
            .is_none()
        {
            return Ok(GuardedWrite::Gone);
        }
        let removed = LibSqlParticipantRepository::new(db.connection())
            .replace_all(regform_id, records)
            .await?;
        drop(db);

        self.publish(TableChange::upsert(Table::Participants, regform_id.get()));
        if removed > 0 {
            tracing::debug!("Dropped {removed} participants no longer on the server");
            self.publish(TableChange::delete(Table::Participants, regform_id.get()));
        }
        Ok(GuardedWrite::Committed)
    }

    pub async fn set_checked_in(
        &self,
        id: ParticipantId,
        checked_in: bool,
        checked_in_at: Option<i64>,
    ) -> Result<Participant> {
        let db = self.database().await?;
        let participant = LibSqlParticipantRepository::new(db.connection())
            .set_checked_in(id, checked_in, checked_in_at)
            .await?;
        drop(db);
        self.publish(TableChange::upsert(Table::Participants, id.get()));
        Ok(participant)
    }

    /// Locally cached checked-in participants; may disagree with the
    /// regform's server-side `checked_in_count`.
    pub async fn count_checked_in(&self, regform_id: RegformId) -> Result<usize> {
        let db = self.database().await?;
        LibSqlParticipantRepository::new(db.connection())
            .count_checked_in(regform_id)
            .await
    }
}
