//! `OpenAI`-backed triage gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Concern, TriageGateway};
use crate::{Error, Result};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Per-request deadline. Triage is fail-open, so a slow gateway turns into
/// the neutral default rather than a stuck caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Triage gateway backed by the `OpenAI` chat completions API
pub struct OpenAiTriage {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiTriage {
    /// Create a new gateway with the default model
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: "gpt-4o".to_string(),
        }
    }

    /// Override the model identifier
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// One chat completion round-trip, low temperature for stable outputs
    async fn chat(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.1,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Triage(format!("gateway error: {status} - {body}")));
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Triage("gateway returned no content".to_string()))
    }
}

#[async_trait]
impl TriageGateway for OpenAiTriage {
    async fn urgency_score(&self, transcript: &str) -> Result<u8> {
        let prompt = format!(
            "Rate the urgency of this 911 transcript from 1 (not urgent) to 10 (life-threatening). Return only the number.\n\nTranscript:\n\"{transcript}\"\n"
        );

        let reply = self.chat(&prompt, 10).await?;
        parse_score(&reply)
    }

    async fn key_concerns(&self, transcript: &str) -> Result<Vec<Concern>> {
        let vocabulary = Concern::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "Extract any relevant safety concerns from the transcript. Only choose from this list:\n{vocabulary}\n\nReturn only the concerns as a comma-separated list with no additional text.\n\nTranscript:\n\"{transcript}\"\n"
        );

        let reply = self.chat(&prompt, 100).await?;
        Ok(parse_concerns(&reply))
    }
}

/// Parse the model's score reply, clamped into the valid range
fn parse_score(reply: &str) -> Result<u8> {
    reply
        .trim()
        .parse::<i64>()
        .map(|score| u8::try_from(score.clamp(1, 10)).unwrap_or(super::DEFAULT_URGENCY))
        .map_err(|_| Error::Triage(format!("could not parse urgency score: {reply:?}")))
}

/// Parse a comma-separated concern list, dropping anything outside the
/// vocabulary
fn parse_concerns(reply: &str) -> Vec<Concern> {
    reply.split(',').filter_map(Concern::from_label).collect()
}

/// Chat completion response (the fields we read)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
