//! Event, registration form and participant repositories

#![allow(async_fn_in_trait)]

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{
    Event, EventId, NewEvent, NewRegform, Participant, ParticipantId, ParticipantRecord, Regform,
    RegformId,
};
use libsql::{params, Connection, Row};

/// What happens to participants when their registration form is removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegformRemoval {
    /// Remove only the form; cached participants stay in place
    #[default]
    KeepParticipants,
    /// Remove the form and every participant cached under it
    CascadeParticipants,
}

/// Trait for event storage operations
pub trait EventRepository {
    /// Get an event by local id
    async fn get(&self, id: EventId) -> Result<Option<Event>>;

    /// Find an event by its remote identity
    async fn find(&self, base_url: &str, indico_id: i64) -> Result<Option<Event>>;

    /// List all events ordered by title
    async fn list(&self) -> Result<Vec<Event>>;

    /// Insert a new event and return it with its local id
    async fn insert(&self, event: &NewEvent) -> Result<Event>;

    /// Insert or overwrite an event by local id
    async fn upsert(&self, event: &Event) -> Result<()>;

    /// Overwrite an existing event; returns false if it is no longer stored
    async fn update(&self, event: &Event) -> Result<bool>;
}

/// Trait for registration form storage operations
pub trait RegformRepository {
    /// Get a registration form by local id
    async fn get(&self, id: RegformId) -> Result<Option<Regform>>;

    /// Get a registration form only if it belongs to the given event
    async fn get_in_event(&self, id: RegformId, event_id: EventId) -> Result<Option<Regform>>;

    /// Find a registration form by its remote identity within an event
    async fn find(&self, event_id: EventId, indico_id: i64) -> Result<Option<Regform>>;

    /// List the registration forms of an event ordered by title
    async fn list(&self, event_id: EventId) -> Result<Vec<Regform>>;

    /// Insert a new registration form and return it with its local id
    async fn insert(&self, regform: &NewRegform) -> Result<Regform>;

    /// Insert or overwrite a registration form by local id
    async fn upsert(&self, regform: &Regform) -> Result<()>;

    /// Overwrite an existing registration form; returns false if it is no
    /// longer stored
    async fn update(&self, regform: &Regform) -> Result<bool>;

    /// Remove a registration form; returns whether a row was removed
    async fn delete(&self, id: RegformId, removal: RegformRemoval) -> Result<bool>;
}

/// Trait for participant storage operations
pub trait ParticipantRepository {
    /// Get a participant by local id
    async fn get(&self, id: ParticipantId) -> Result<Option<Participant>>;

    /// List the participants of a registration form, sorted by full name
    async fn list(&self, regform_id: RegformId) -> Result<Vec<Participant>>;

    /// Upsert a batch of remote records atomically
    async fn upsert_many(&self, regform_id: RegformId, records: &[ParticipantRecord])
        -> Result<()>;

    /// Make `records` the complete participant set of a registration form.
    ///
    /// Upserts every record and removes cached participants whose remote id
    /// is not among them, in one transaction. Returns how many were removed.
    async fn replace_all(&self, regform_id: RegformId, records: &[ParticipantRecord])
        -> Result<usize>;

    /// Set the check-in flag of a participant
    async fn set_checked_in(
        &self,
        id: ParticipantId,
        checked_in: bool,
        checked_in_at: Option<i64>,
    ) -> Result<Participant>;

    /// Count checked-in participants cached for a registration form
    async fn count_checked_in(&self, regform_id: RegformId) -> Result<usize>;
}

const EVENT_COLUMNS: &str = "id, indico_id, base_url, title";
const REGFORM_COLUMNS: &str =
    "id, event_id, indico_id, title, is_open, registration_count, checked_in_count";
const PARTICIPANT_COLUMNS: &str =
    "id, regform_id, indico_id, full_name, email, checked_in, checked_in_at";

/// libSQL implementation of `EventRepository`
pub struct LibSqlEventRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEventRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_event(row: &Row) -> Result<Event> {
        Ok(Event {
            id: EventId::new(row.get(0)?),
            indico_id: row.get(1)?,
            base_url: row.get(2)?,
            title: row.get(3)?,
        })
    }

    async fn query_one(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Event>> {
        let mut rows = self.conn.query(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_event(&row)?)),
            None => Ok(None),
        }
    }
}

impl EventRepository for LibSqlEventRepository<'_> {
    async fn get(&self, id: EventId) -> Result<Option<Event>> {
        self.query_one(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            params![id.get()],
        )
        .await
    }

    async fn find(&self, base_url: &str, indico_id: i64) -> Result<Option<Event>> {
        self.query_one(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE base_url = ?1 AND indico_id = ?2"),
            params![base_url, indico_id],
        )
        .await
    }

    async fn list(&self) -> Result<Vec<Event>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY title ASC, id ASC"),
                (),
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::parse_event(&row)?);
        }
        Ok(events)
    }

    async fn insert(&self, event: &NewEvent) -> Result<Event> {
        self.conn
            .execute(
                "INSERT INTO events (indico_id, base_url, title) VALUES (?1, ?2, ?3)",
                params![event.indico_id, event.base_url.as_str(), event.title.as_str()],
            )
            .await?;

        Ok(Event {
            id: EventId::new(self.conn.last_insert_rowid()),
            indico_id: event.indico_id,
            base_url: event.base_url.clone(),
            title: event.title.clone(),
        })
    }

    async fn upsert(&self, event: &Event) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO events (id, indico_id, base_url, title) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    indico_id = excluded.indico_id,
                    base_url = excluded.base_url,
                    title = excluded.title",
                params![
                    event.id.get(),
                    event.indico_id,
                    event.base_url.as_str(),
                    event.title.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn update(&self, event: &Event) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE events SET indico_id = ?2, base_url = ?3, title = ?4 WHERE id = ?1",
                params![
                    event.id.get(),
                    event.indico_id,
                    event.base_url.as_str(),
                    event.title.as_str()
                ],
            )
            .await?;
        Ok(rows > 0)
    }
}

/// libSQL implementation of `RegformRepository`
pub struct LibSqlRegformRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRegformRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_regform(row: &Row) -> Result<Regform> {
        Ok(Regform {
            id: RegformId::new(row.get(0)?),
            event_id: EventId::new(row.get(1)?),
            indico_id: row.get(2)?,
            title: row.get(3)?,
            is_open: row.get::<i32>(4)? != 0,
            registration_count: row.get(5)?,
            checked_in_count: row.get(6)?,
        })
    }

    async fn query_one(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Regform>> {
        let mut rows = self.conn.query(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_regform(&row)?)),
            None => Ok(None),
        }
    }
}

impl RegformRepository for LibSqlRegformRepository<'_> {
    async fn get(&self, id: RegformId) -> Result<Option<Regform>> {
        self.query_one(
            &format!("SELECT {REGFORM_COLUMNS} FROM regforms WHERE id = ?1"),
            params![id.get()],
        )
        .await
    }

    async fn get_in_event(&self, id: RegformId, event_id: EventId) -> Result<Option<Regform>> {
        self.query_one(
            &format!("SELECT {REGFORM_COLUMNS} FROM regforms WHERE id = ?1 AND event_id = ?2"),
            params![id.get(), event_id.get()],
        )
        .await
    }

    async fn find(&self, event_id: EventId, indico_id: i64) -> Result<Option<Regform>> {
        self.query_one(
            &format!(
                "SELECT {REGFORM_COLUMNS} FROM regforms WHERE event_id = ?1 AND indico_id = ?2"
            ),
            params![event_id.get(), indico_id],
        )
        .await
    }

    async fn list(&self, event_id: EventId) -> Result<Vec<Regform>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {REGFORM_COLUMNS} FROM regforms
                     WHERE event_id = ?1
                     ORDER BY title ASC, id ASC"
                ),
                params![event_id.get()],
            )
            .await?;

        let mut regforms = Vec::new();
        while let Some(row) = rows.next().await? {
            regforms.push(Self::parse_regform(&row)?);
        }
        Ok(regforms)
    }

    async fn insert(&self, regform: &NewRegform) -> Result<Regform> {
        self.conn
            .execute(
                "INSERT INTO regforms (event_id, indico_id, title) VALUES (?1, ?2, ?3)",
                params![
                    regform.event_id.get(),
                    regform.indico_id,
                    regform.title.as_str()
                ],
            )
            .await?;

        Ok(Regform {
            id: RegformId::new(self.conn.last_insert_rowid()),
            event_id: regform.event_id,
            indico_id: regform.indico_id,
            title: regform.title.clone(),
            is_open: false,
            registration_count: 0,
            checked_in_count: 0,
        })
    }

    async fn upsert(&self, regform: &Regform) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO regforms (
                    id, event_id, indico_id, title, is_open, registration_count, checked_in_count
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    event_id = excluded.event_id,
                    indico_id = excluded.indico_id,
                    title = excluded.title,
                    is_open = excluded.is_open,
                    registration_count = excluded.registration_count,
                    checked_in_count = excluded.checked_in_count",
                params![
                    regform.id.get(),
                    regform.event_id.get(),
                    regform.indico_id,
                    regform.title.as_str(),
                    i32::from(regform.is_open),
                    regform.registration_count,
                    regform.checked_in_count
                ],
            )
            .await?;
        Ok(())
    }

    async fn update(&self, regform: &Regform) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE regforms SET
                    event_id = ?2,
                    indico_id = ?3,
                    title = ?4,
                    is_open = ?5,
                    registration_count = ?6,
                    checked_in_count = ?7
                 WHERE id = ?1",
                params![
                    regform.id.get(),
                    regform.event_id.get(),
                    regform.indico_id,
                    regform.title.as_str(),
                    i32::from(regform.is_open),
                    regform.registration_count,
                    regform.checked_in_count
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete(&self, id: RegformId, removal: RegformRemoval) -> Result<bool> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            if removal == RegformRemoval::CascadeParticipants {
                self.conn
                    .execute(
                        "DELETE FROM participants WHERE regform_id = ?1",
                        params![id.get()],
                    )
                    .await?;
            }
            self.conn
                .execute("DELETE FROM regforms WHERE id = ?1", params![id.get()])
                .await
        }
        .await;

        match result {
            Ok(removed) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(removed > 0)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e.into())
            }
        }
    }
}

/// libSQL implementation of `ParticipantRepository`
pub struct LibSqlParticipantRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlParticipantRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_participant(row: &Row) -> Result<Participant> {
        Ok(Participant {
            id: ParticipantId::new(row.get(0)?),
            regform_id: RegformId::new(row.get(1)?),
            indico_id: row.get(2)?,
            full_name: row.get(3)?,
            email: row.get(4)?,
            checked_in: row.get::<i32>(5)? != 0,
            checked_in_at: row.get(6)?,
        })
    }

    async fn upsert_one(&self, regform_id: RegformId, record: &ParticipantRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO participants (
                    regform_id, indico_id, full_name, email, checked_in, checked_in_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(regform_id, indico_id) DO UPDATE SET
                    full_name = excluded.full_name,
                    email = excluded.email,
                    checked_in = excluded.checked_in,
                    checked_in_at = excluded.checked_in_at",
                params![
                    regform_id.get(),
                    record.indico_id,
                    record.full_name.as_str(),
                    record.email.clone(),
                    i32::from(record.checked_in),
                    record.checked_in_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn prune(&self, regform_id: RegformId, keep: &HashSet<i64>) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT indico_id FROM participants WHERE regform_id = ?1",
                params![regform_id.get()],
            )
            .await?;

        let mut stale = Vec::new();
        while let Some(row) = rows.next().await? {
            let indico_id: i64 = row.get(0)?;
            if !keep.contains(&indico_id) {
                stale.push(indico_id);
            }
        }
        drop(rows);

        for indico_id in &stale {
            self.conn
                .execute(
                    "DELETE FROM participants WHERE regform_id = ?1 AND indico_id = ?2",
                    params![regform_id.get(), *indico_id],
                )
                .await?;
        }
        Ok(stale.len())
    }
}

impl ParticipantRepository for LibSqlParticipantRepository<'_> {
    async fn get(&self, id: ParticipantId) -> Result<Option<Participant>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?1"),
                params![id.get()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_participant(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, regform_id: RegformId) -> Result<Vec<Participant>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PARTICIPANT_COLUMNS} FROM participants
                     WHERE regform_id = ?1
                     ORDER BY full_name ASC, id ASC"
                ),
                params![regform_id.get()],
            )
            .await?;

        let mut participants = Vec::new();
        while let Some(row) = rows.next().await? {
            participants.push(Self::parse_participant(&row)?);
        }
        Ok(participants)
    }

    async fn upsert_many(
        &self,
        regform_id: RegformId,
        records: &[ParticipantRecord],
    ) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        for record in records {
            if let Err(e) = self.upsert_one(regform_id, record).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn replace_all(
        &self,
        regform_id: RegformId,
        records: &[ParticipantRecord],
    ) -> Result<usize> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = async {
            for record in records {
                self.upsert_one(regform_id, record).await?;
            }
            let keep: HashSet<i64> = records.iter().map(|record| record.indico_id).collect();
            self.prune(regform_id, &keep).await
        }
        .await;

        match result {
            Ok(removed) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(removed)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn set_checked_in(
        &self,
        id: ParticipantId,
        checked_in: bool,
        checked_in_at: Option<i64>,
    ) -> Result<Participant> {
        let rows = self
            .conn
            .execute(
                "UPDATE participants SET checked_in = ?1, checked_in_at = ?2 WHERE id = ?3",
                params![i32::from(checked_in), checked_in_at, id.get()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Participant {id}")));
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Participant {id}")))
    }

    async fn count_checked_in(&self, regform_id: RegformId) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM participants WHERE regform_id = ?1 AND checked_in = 1",
                params![regform_id.get()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|error| Error::Database(error.to_string()))
    }
}
