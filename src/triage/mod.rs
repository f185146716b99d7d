//! AI triage gateway
//!
//! Turns accumulated transcript text into an urgency score and a set of
//! safety concerns. Triage never runs inside the webhook request path; it is
//! invoked by the external orchestrator through the `/api/ai` endpoints or
//! by the `halo triage` command.
//!
//! Failure policy: triage is fail-open. A stalled or missing score must not
//! block dispatch, so errors are replaced with a neutral default — score 5,
//! no concerns — recorded with `scored = false` so downstream readers can
//! tell the default apart from a genuine model score of 5.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{CallRepo, InsightRepo, TranscriptRepo, TriageInsight};
use crate::Result;

pub use openai::OpenAiTriage;

/// Neutral urgency substituted when the gateway fails or is unconfigured
pub const DEFAULT_URGENCY: u8 = 5;

/// Controlled vocabulary of safety concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Concern {
    #[serde(rename = "Domestic Violence")]
    DomesticViolence,
    #[serde(rename = "Bleeding")]
    Bleeding,
    #[serde(rename = "Head Injury")]
    HeadInjury,
    #[serde(rename = "Perpetrator Present")]
    PerpetratorPresent,
    #[serde(rename = "Mental Health Crisis")]
    MentalHealthCrisis,
    #[serde(rename = "Unknown Location")]
    UnknownLocation,
}

impl Concern {
    /// Every member of the vocabulary, in prompt order
    pub const ALL: [Self; 6] = [
        Self::DomesticViolence,
        Self::Bleeding,
        Self::HeadInjury,
        Self::PerpetratorPresent,
        Self::MentalHealthCrisis,
        Self::UnknownLocation,
    ];

    /// Human-readable label, as used in prompts and stored JSON
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DomesticViolence => "Domestic Violence",
            Self::Bleeding => "Bleeding",
            Self::HeadInjury => "Head Injury",
            Self::PerpetratorPresent => "Perpetrator Present",
            Self::MentalHealthCrisis => "Mental Health Crisis",
            Self::UnknownLocation => "Unknown Location",
        }
    }

    /// Parse a label back into the vocabulary; anything outside it is
    /// dropped, not invented
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label.trim())
    }
}

/// Black-box scoring interface the core depends on
#[async_trait]
pub trait TriageGateway: Send + Sync {
    /// Rate transcript urgency from 1 (not urgent) to 10 (life-threatening)
    async fn urgency_score(&self, transcript: &str) -> Result<u8>;

    /// Extract safety concerns drawn from the controlled vocabulary
    async fn key_concerns(&self, transcript: &str) -> Result<Vec<Concern>>;
}

/// Result of one triage pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageOutcome {
    pub score: u8,
    pub concerns: Vec<Concern>,
    /// False when `score` is the neutral default rather than a model output
    pub scored: bool,
}

impl TriageOutcome {
    /// The fail-open neutral outcome
    #[must_use]
    pub const fn unscored() -> Self {
        Self {
            score: DEFAULT_URGENCY,
            concerns: Vec::new(),
            scored: false,
        }
    }
}

/// Run one triage pass with the fail-open policy applied.
///
/// The two calls fail independently, matching the gateway's behavior: a
/// failed score yields the unscored default while concerns may still land,
/// and vice versa.
pub async fn run_triage(gateway: &dyn TriageGateway, transcript: &str) -> TriageOutcome {
    let (score, scored) = match gateway.urgency_score(transcript).await {
        Ok(score) => (score, true),
        Err(e) => {
            tracing::warn!(error = %e, "urgency scoring failed, substituting neutral default");
            (DEFAULT_URGENCY, false)
        }
    };

    let concerns = match gateway.key_concerns(transcript).await {
        Ok(concerns) => concerns,
        Err(e) => {
            tracing::warn!(error = %e, "concern extraction failed, substituting empty set");
            Vec::new()
        }
    };

    TriageOutcome {
        score,
        concerns,
        scored,
    }
}

/// Triage service: runs the gateway and persists the insight against the
/// session. Constructed explicitly at startup and handed to the API layer
/// and CLI — no global client state.
#[derive(Clone)]
pub struct TriageService {
    gateway: Option<Arc<dyn TriageGateway>>,
    calls: CallRepo,
    transcripts: TranscriptRepo,
    insights: InsightRepo,
}

impl TriageService {
    /// Create a new triage service. `gateway` is `None` when no API key is
    /// configured; every pass then records the unscored default.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(
        gateway: Option<Arc<dyn TriageGateway>>,
        calls: CallRepo,
        transcripts: TranscriptRepo,
        insights: InsightRepo,
    ) -> Self {
        Self {
            gateway,
            calls,
            transcripts,
            insights,
        }
    }

    /// Whether a real gateway is wired in (readiness reporting)
    #[must_use]
    pub const fn gateway_configured(&self) -> bool {
        self.gateway.is_some()
    }

    /// Triage the given transcript text for a call and persist the result.
    ///
    /// When no session exists for `external_call_id`, the outcome is still
    /// returned to the caller but nothing is persisted — an insight belongs
    /// to a session.
    ///
    /// # Errors
    ///
    /// Returns error only on persistence failure; gateway failure is
    /// absorbed by the fail-open policy.
    pub async fn annotate(
        &self,
        external_call_id: &str,
        transcript: &str,
    ) -> Result<TriageOutcome> {
        let outcome = match &self.gateway {
            Some(gateway) => run_triage(gateway.as_ref(), transcript).await,
            None => {
                tracing::warn!("no triage gateway configured, recording unscored default");
                TriageOutcome::unscored()
            }
        };

        match self.calls.get(external_call_id)? {
            Some(session) => {
                self.insights.record(
                    &session.id,
                    outcome.score,
                    &outcome.concerns,
                    outcome.scored,
                )?;
                self.calls.set_urgency(&session.id, outcome.score)?;
                tracing::info!(
                    external_call_id,
                    score = outcome.score,
                    scored = outcome.scored,
                    concerns = outcome.concerns.len(),
                    "triage insight recorded"
                );
            }
            None => {
                tracing::warn!(external_call_id, "triage for unknown call not persisted");
            }
        }

        Ok(outcome)
    }

    /// Triage a call from its accumulated transcript history
    ///
    /// # Errors
    ///
    /// Returns error on persistence failure
    pub async fn annotate_from_history(&self, external_call_id: &str) -> Result<TriageOutcome> {
        let transcript = match self.calls.get(external_call_id)? {
            Some(session) => self.transcripts.full_text(&session.id)?,
            None => String::new(),
        };
        self.annotate(external_call_id, &transcript).await
    }

    /// Most recent insight recorded for a call, if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn latest_insight(&self, external_call_id: &str) -> Result<Option<TriageInsight>> {
        match self.calls.get(external_call_id)? {
            Some(session) => self.insights.latest(&session.id),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use crate::Error;

    struct FailingGateway;

    #[async_trait]
    impl TriageGateway for FailingGateway {
        async fn urgency_score(&self, _transcript: &str) -> Result<u8> {
            Err(Error::Triage("timed out".to_string()))
        }

        async fn key_concerns(&self, _transcript: &str) -> Result<Vec<Concern>> {
            Err(Error::Triage("timed out".to_string()))
        }
    }

    struct FixedGateway;

    #[async_trait]
    impl TriageGateway for FixedGateway {
        async fn urgency_score(&self, _transcript: &str) -> Result<u8> {
            Ok(9)
        }

        async fn key_concerns(&self, _transcript: &str) -> Result<Vec<Concern>> {
            Ok(vec![Concern::Bleeding, Concern::PerpetratorPresent])
        }
    }

    fn service(gateway: Option<Arc<dyn TriageGateway>>) -> (TriageService, CallRepo) {
        let pool = init_memory().unwrap();
        let calls = CallRepo::new(pool.clone());
        let service = TriageService::new(
            gateway,
            calls.clone(),
            TranscriptRepo::new(pool.clone()),
            InsightRepo::new(pool),
        );
        (service, calls)
    }

    #[tokio::test]
    async fn test_gateway_failure_yields_unscored_default() {
        let outcome = run_triage(&FailingGateway, "He's bleeding badly").await;
        assert_eq!(outcome.score, DEFAULT_URGENCY);
        assert!(outcome.concerns.is_empty());
        assert!(!outcome.scored);
    }

    #[tokio::test]
    async fn test_annotate_records_insight_and_urgency() {
        let (service, calls) = service(Some(Arc::new(FixedGateway)));
        calls.resolve_or_create("call_1").unwrap();

        let outcome = service
            .annotate("call_1", "caller: He's bleeding badly")
            .await
            .unwrap();
        assert_eq!(outcome.score, 9);
        assert!(outcome.scored);

        let insight = service.latest_insight("call_1").unwrap().unwrap();
        assert_eq!(insight.urgency_score, 9);
        assert_eq!(
            insight.concerns,
            vec![Concern::Bleeding, Concern::PerpetratorPresent]
        );

        let session = calls.get("call_1").unwrap().unwrap();
        assert_eq!(session.urgency_score, Some(9));
    }

    #[tokio::test]
    async fn test_annotate_failure_persists_unscored_marker() {
        let (service, calls) = service(Some(Arc::new(FailingGateway)));
        calls.resolve_or_create("call_2").unwrap();

        let outcome = service.annotate("call_2", "some transcript").await.unwrap();
        assert_eq!(outcome.score, DEFAULT_URGENCY);

        let insight = service.latest_insight("call_2").unwrap().unwrap();
        assert!(!insight.scored);
        assert_eq!(insight.urgency_score, DEFAULT_URGENCY);
    }

    #[tokio::test]
    async fn test_annotate_unknown_call_not_persisted() {
        let (service, calls) = service(Some(Arc::new(FixedGateway)));

        let outcome = service.annotate("ghost", "text").await.unwrap();
        assert_eq!(outcome.score, 9);
        assert!(calls.get("ghost").unwrap().is_none());
        assert!(service.latest_insight("ghost").unwrap().is_none());
    }

    #[test]
    fn test_concern_label_round_trip() {
        for concern in Concern::ALL {
            assert_eq!(Concern::from_label(concern.as_str()), Some(concern));
        }
        assert_eq!(Concern::from_label("Sprained Ankle"), None);
        assert_eq!(Concern::from_label("  Bleeding "), Some(Concern::Bleeding));
    }
}
