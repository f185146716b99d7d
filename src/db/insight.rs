//! Triage insight repository
//!
//! Insights are written by the out-of-band triage pass, never by the webhook
//! path. Multiple rows may exist per call; the most recent is authoritative.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::triage::Concern;
use crate::{Error, Result};

/// An AI triage insight for a call
#[derive(Debug, Clone)]
pub struct TriageInsight {
    pub id: String,
    pub call_id: String,
    pub urgency_score: u8,
    pub concerns: Vec<Concern>,
    /// False when the score is the neutral fail-open default rather than a
    /// model output
    pub scored: bool,
    pub created_at: DateTime<Utc>,
}

/// Triage insight repository
#[derive(Clone)]
pub struct InsightRepo {
    pool: DbPool,
}

impl InsightRepo {
    /// Create a new insight repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a triage insight for a call
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn record(
        &self,
        call_id: &str,
        urgency_score: u8,
        concerns: &[Concern],
        scored: bool,
    ) -> Result<TriageInsight> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let concerns_json = serde_json::to_string(concerns)?;

        conn.execute(
            "INSERT INTO insights (id, call_id, urgency_score, concerns, scored, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                call_id,
                i64::from(urgency_score),
                concerns_json,
                scored,
                now_str
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(TriageInsight {
            id,
            call_id: call_id.to_string(),
            urgency_score,
            concerns: concerns.to_vec(),
            scored,
            created_at: now,
        })
    }

    /// Get the most recent insight for a call
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn latest(&self, call_id: &str) -> Result<Option<TriageInsight>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let insight = conn
            .query_row(
                "SELECT id, call_id, urgency_score, concerns, scored, created_at
                 FROM insights WHERE call_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [call_id],
                |row| {
                    let score: i64 = row.get(2)?;
                    let concerns_json: String = row.get(3)?;
                    Ok(TriageInsight {
                        id: row.get(0)?,
                        call_id: row.get(1)?,
                        urgency_score: u8::try_from(score).unwrap_or(u8::MAX),
                        concerns: serde_json::from_str(&concerns_json).unwrap_or_default(),
                        scored: row.get(4)?,
                        created_at: parse_datetime(&row.get::<_, String>(5)?),
                    })
                },
            )
            .ok();

        Ok(insight)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
