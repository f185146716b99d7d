//! Call session repository
//!
//! One session row exists per platform-issued call identifier, enforced by
//! the UNIQUE constraint on `external_call_id`. The lifecycle manager is the
//! only writer of `status`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DbPool, caller::CallerRepo};
use crate::{Error, Result};

/// Lifecycle status of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Active,
    Completed,
}

impl CallStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A call session
#[derive(Debug, Clone)]
pub struct CallSession {
    pub id: String,
    pub external_call_id: String,
    pub caller_id: Option<String>,
    pub status: CallStatus,
    pub urgency_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Call session repository
#[derive(Clone)]
pub struct CallRepo {
    pool: DbPool,
}

impl CallRepo {
    /// Create a new call repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolve a session for an external call identifier, creating one on
    /// first sight.
    ///
    /// The insert is `ON CONFLICT DO NOTHING` against the UNIQUE constraint,
    /// so concurrent first arrivals produce exactly one row: the winner
    /// creates, losers fall through to the read. A placeholder caller profile
    /// is linked in the same transaction, so a session never commits
    /// half-created.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn resolve_or_create(&self, external_call_id: &str) -> Result<CallSession> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        let inserted = tx
            .execute(
                "INSERT INTO calls (id, external_call_id, status, created_at, updated_at)
                 VALUES (?1, ?2, 'active', ?3, ?3)
                 ON CONFLICT(external_call_id) DO NOTHING",
                [&id, external_call_id, &now],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        if inserted > 0 {
            let caller_id = CallerRepo::insert_placeholder(&tx)?;
            tx.execute(
                "UPDATE calls SET caller_id = ?1 WHERE id = ?2",
                [&caller_id, &id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
            tracing::info!(external_call_id, session = %id, "call session created");
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        // Return the connection before the read-back; the losing side of a
        // concurrent create must not starve a small pool.
        drop(conn);

        self.get(external_call_id)?
            .ok_or_else(|| Error::Database(format!("session vanished for {external_call_id}")))
    }

    /// Find a session by external call identifier
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, external_call_id: &str) -> Result<Option<CallSession>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let session = conn
            .query_row(
                "SELECT id, external_call_id, caller_id, status, urgency_score, created_at, updated_at
                 FROM calls WHERE external_call_id = ?1",
                [external_call_id],
                map_session,
            )
            .ok();

        Ok(session)
    }

    /// Mark a session active. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn mark_active(&self, session_id: &str) -> Result<()> {
        self.set_status(session_id, CallStatus::Active)
    }

    /// Mark a session completed. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn mark_completed(&self, session_id: &str) -> Result<()> {
        self.set_status(session_id, CallStatus::Completed)
    }

    fn set_status(&self, session_id: &str, status: CallStatus) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE calls SET status = ?1, updated_at = ?2 WHERE id = ?3",
            [status.as_str(), &now, session_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Record the latest authoritative urgency score on the session
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_urgency(&self, session_id: &str, score: u8) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE calls SET urgency_score = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![i64::from(score), now, session_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Count sessions for an external call identifier (test support for the
    /// at-most-one invariant)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_external_id(&self, external_call_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM calls WHERE external_call_id = ?1",
                [external_call_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallSession> {
    let urgency: Option<i64> = row.get(4)?;
    Ok(CallSession {
        id: row.get(0)?,
        external_call_id: row.get(1)?,
        caller_id: row.get(2)?,
        status: CallStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(CallStatus::Active),
        urgency_score: urgency.and_then(|s| u8::try_from(s).ok()),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
