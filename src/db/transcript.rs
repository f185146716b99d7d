//! Transcript repository
//!
//! Utterances are append-only; history is never rewritten. Timestamps record
//! arrival order, which is the best ordering the platform guarantees.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Who said an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Caller,
    Dispatcher,
}

impl Speaker {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Caller => "caller",
            Self::Dispatcher => "dispatcher",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "caller" => Some(Self::Caller),
            "dispatcher" => Some(Self::Dispatcher),
            _ => None,
        }
    }

    /// Normalize the platform's transcript role. The platform tags the human
    /// on the line as "user"; every other role is the assistant/dispatcher
    /// side of the conversation.
    #[must_use]
    pub fn from_platform_role(role: &str) -> Self {
        if role == "user" {
            Self::Caller
        } else {
            Self::Dispatcher
        }
    }
}

/// A transcript utterance
#[derive(Debug, Clone)]
pub struct Utterance {
    pub id: String,
    pub call_id: String,
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Transcript repository
#[derive(Clone)]
pub struct TranscriptRepo {
    pool: DbPool,
}

impl TranscriptRepo {
    /// Create a new transcript repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an utterance to a call's transcript.
    ///
    /// Text is trimmed; empty or whitespace-only fragments are discarded and
    /// `None` is returned — they are never persisted.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append(&self, call_id: &str, speaker: Speaker, text: &str) -> Result<Option<Utterance>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO transcripts (id, call_id, speaker, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            [&id, call_id, speaker.as_str(), text, &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Some(Utterance {
            id,
            call_id: call_id.to_string(),
            speaker,
            text: text.to_string(),
            created_at: now,
        }))
    }

    /// List a call's utterances in arrival order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, call_id: &str) -> Result<Vec<Utterance>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, call_id, speaker, text, created_at
                 FROM transcripts WHERE call_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let utterances = stmt
            .query_map([call_id], |row| {
                Ok(Utterance {
                    id: row.get(0)?,
                    call_id: row.get(1)?,
                    speaker: Speaker::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(Speaker::Caller),
                    text: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(utterances)
    }

    /// Count utterances for a call
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self, call_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM transcripts WHERE call_id = ?1",
                [call_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Render the accumulated transcript as triage input, one speaker-tagged
    /// line per utterance
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn full_text(&self, call_id: &str) -> Result<String> {
        let lines: Vec<String> = self
            .list(call_id)?
            .into_iter()
            .map(|u| format!("{}: {}", u.speaker.as_str(), u.text))
            .collect();

        Ok(lines.join("\n"))
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
