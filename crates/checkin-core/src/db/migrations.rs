//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: events, registration forms and participants
async fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            indico_id INTEGER NOT NULL,
            base_url TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            UNIQUE (base_url, indico_id)
        )",
        "CREATE TABLE IF NOT EXISTS regforms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            indico_id INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            is_open INTEGER NOT NULL DEFAULT 0,
            registration_count INTEGER NOT NULL DEFAULT 0,
            checked_in_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE (event_id, indico_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_regforms_event ON regforms(event_id)",
        "CREATE INDEX IF NOT EXISTS idx_regforms_id_event ON regforms(id, event_id)",
        // No foreign key on regform_id; regform removal may keep participants
        "CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            regform_id INTEGER NOT NULL,
            indico_id INTEGER NOT NULL,
            full_name TEXT NOT NULL,
            email TEXT,
            checked_in INTEGER NOT NULL DEFAULT 0,
            checked_in_at INTEGER,
            UNIQUE (regform_id, indico_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_participants_regform_name
            ON participants(regform_id, full_name, id)",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
