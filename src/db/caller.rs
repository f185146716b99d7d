//! Caller profile repository
//!
//! Profiles are created as placeholders when a call arrives for an unknown
//! caller; enrichment (real name, address, medical history) happens
//! out-of-band and is not this service's responsibility.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Placeholder name for callers that have not been identified yet
pub const UNKNOWN_CALLER_NAME: &str = "Unknown Caller";

/// A caller profile
#[derive(Debug, Clone)]
pub struct CallerProfile {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub medical_notes: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller profile repository
#[derive(Clone)]
pub struct CallerRepo {
    pool: DbPool,
}

impl CallerRepo {
    /// Create a new caller repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a placeholder profile on an existing connection, returning its
    /// id. Runs inside the caller's transaction so session creation and
    /// profile linkage commit together.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert_placeholder(conn: &rusqlite::Connection) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO callers (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            [&id, UNKNOWN_CALLER_NAME, &now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(id)
    }

    /// Find a caller profile by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<CallerProfile>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let profile = conn
            .query_row(
                "SELECT id, name, address, medical_notes, allergies, emergency_contact,
                        created_at, updated_at
                 FROM callers WHERE id = ?1",
                [id],
                |row| {
                    Ok(CallerProfile {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        address: row.get(2)?,
                        medical_notes: row.get(3)?,
                        allergies: row.get(4)?,
                        emergency_contact: row.get(5)?,
                        created_at: parse_datetime(&row.get::<_, String>(6)?),
                        updated_at: parse_datetime(&row.get::<_, String>(7)?),
                    })
                },
            )
            .ok();

        Ok(profile)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CallRepo, init_memory};

    #[test]
    fn test_placeholder_created_with_session() {
        let pool = init_memory().unwrap();
        let calls = CallRepo::new(pool.clone());
        let callers = CallerRepo::new(pool);

        let session = calls.resolve_or_create("call_1").unwrap();
        let caller_id = session.caller_id.expect("placeholder linked");

        let profile = callers.find(&caller_id).unwrap().unwrap();
        assert_eq!(profile.name, UNKNOWN_CALLER_NAME);
        assert!(profile.address.is_none());
    }
}
