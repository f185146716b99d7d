//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Caller profiles, created as placeholders and enriched out-of-band
        CREATE TABLE IF NOT EXISTS callers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT,
            medical_notes TEXT,
            allergies TEXT,
            emergency_contact TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Call sessions, one per platform-issued call identifier.
        -- The UNIQUE constraint is what makes resolve-or-create race-safe.
        CREATE TABLE IF NOT EXISTS calls (
            id TEXT PRIMARY KEY,
            external_call_id TEXT NOT NULL UNIQUE,
            caller_id TEXT REFERENCES callers(id),
            status TEXT NOT NULL CHECK(status IN ('active', 'completed')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_calls_external ON calls(external_call_id);

        -- Transcript utterances, append-only
        CREATE TABLE IF NOT EXISTS transcripts (
            id TEXT PRIMARY KEY,
            call_id TEXT NOT NULL REFERENCES calls(id),
            speaker TEXT NOT NULL CHECK(speaker IN ('caller', 'dispatcher')),
            text TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_transcripts_call ON transcripts(call_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- AI triage insights; the most recent row per call is authoritative.
        -- scored = 0 marks the neutral fail-open default, not a model output.
        CREATE TABLE IF NOT EXISTS insights (
            id TEXT PRIMARY KEY,
            call_id TEXT NOT NULL REFERENCES calls(id),
            urgency_score INTEGER NOT NULL CHECK(urgency_score BETWEEN 1 AND 10),
            concerns TEXT NOT NULL DEFAULT '[]',
            scored INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_insights_call ON insights(call_id);

        -- Latest urgency denormalized onto the session for dashboard reads
        ALTER TABLE calls ADD COLUMN urgency_score INTEGER;

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2 (triage insights)");
    Ok(())
}
