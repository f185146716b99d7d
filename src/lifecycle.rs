//! Call lifecycle manager
//!
//! Drives the per-call state machine (`unseen -> active -> completed`) and
//! builds the synchronous response returned inside the webhook's
//! request/response cycle. This is the sole writer of session status.

use serde::Serialize;

use crate::db::{CallRepo, Speaker, TranscriptRepo};
use crate::events::CallEvent;
use crate::Result;

/// Function name the platform invokes to request a call transfer
pub const TRANSFER_FUNCTION: &str = "transferCall";

/// Synchronous reply to a webhook delivery
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WebhookReply {
    /// Assistant configuration returned on `call-start`
    AssistantConfig(AssistantConfigResponse),
    /// Transfer instruction returned for a `transferCall` function call
    Transfer(TransferResponse),
    /// Plain acknowledgement
    Ack(Ack),
}

impl WebhookReply {
    #[must_use]
    pub const fn ack() -> Self {
        Self::Ack(Ack { status: "ok" })
    }
}

/// `{"status":"ok"}`
#[derive(Debug, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

/// Assistant configuration envelope
#[derive(Debug, Serialize)]
pub struct AssistantConfigResponse {
    pub assistant: AssistantConfig,
}

/// Voice-assistant configuration: forward the call immediately and start
/// transcribing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    pub first_message: String,
    pub forwarding_phone_number: String,
    pub model: ModelConfig,
    pub transcriber: TranscriberConfig,
    pub functions: Vec<FunctionDef>,
}

/// LLM backing the assistant while the transfer connects
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: &'static str,
    pub model: &'static str,
    pub system_prompt: String,
}

/// Live transcription settings
#[derive(Debug, Serialize)]
pub struct TranscriberConfig {
    pub provider: &'static str,
    pub model: &'static str,
}

/// A function the assistant may invoke
#[derive(Debug, Serialize)]
pub struct FunctionDef {
    pub name: &'static str,
    pub description: &'static str,
}

/// Transfer instruction correlated to the inbound tool call
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub results: Vec<ToolCallResult>,
    pub destination: TransferDestination,
}

/// Result entry matched to the platform's tool-call identifier
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub result: String,
}

/// Where the live call is redirected
#[derive(Debug, Serialize)]
pub struct TransferDestination {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub number: String,
    pub message: String,
}

/// Call lifecycle manager
#[derive(Clone)]
pub struct LifecycleManager {
    calls: CallRepo,
    transcripts: TranscriptRepo,
    dispatcher_number: String,
}

impl LifecycleManager {
    /// Create a new lifecycle manager
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(calls: CallRepo, transcripts: TranscriptRepo, dispatcher_number: String) -> Self {
        Self {
            calls,
            transcripts,
            dispatcher_number,
        }
    }

    /// Apply a classified event to the session state machine and build the
    /// synchronous reply.
    ///
    /// # Errors
    ///
    /// Returns error if a persistence operation fails mid-transition. Session
    /// creation is transactional, so a failed transition leaves no partial
    /// state behind.
    pub fn handle(&self, event: CallEvent) -> Result<WebhookReply> {
        match event {
            CallEvent::CallStart { call_id } => self.on_call_start(&call_id),
            CallEvent::Transcript {
                call_id,
                role,
                text,
            } => self.on_transcript(&call_id, &role, &text),
            CallEvent::FunctionCall { name, tool_call_id } => {
                Ok(self.on_function_call(&name, tool_call_id))
            }
            CallEvent::CallEnd { call_id } => self.on_call_end(&call_id),
            CallEvent::Unrecognized => Ok(WebhookReply::ack()),
        }
    }

    /// `call-start`: unseen -> active. The configuration response is produced
    /// even on redelivery for an already-active session.
    fn on_call_start(&self, external_call_id: &str) -> Result<WebhookReply> {
        let session = self.calls.resolve_or_create(external_call_id)?;
        tracing::info!(external_call_id, session = %session.id, "call started");

        Ok(WebhookReply::AssistantConfig(AssistantConfigResponse {
            assistant: AssistantConfig {
                first_message:
                    "This is the emergency line. Connecting you to a dispatcher now, please stay on the line."
                        .to_string(),
                forwarding_phone_number: self.dispatcher_number.clone(),
                model: ModelConfig {
                    provider: "openai",
                    model: "gpt-4o",
                    system_prompt:
                        "You are an emergency line assistant. Transfer the caller to the human dispatcher immediately. Do not attempt to handle the emergency yourself."
                            .to_string(),
                },
                transcriber: TranscriberConfig {
                    provider: "deepgram",
                    model: "nova-2",
                },
                functions: vec![FunctionDef {
                    name: TRANSFER_FUNCTION,
                    description: "Transfer the live call to the human dispatcher",
                }],
            },
        }))
    }

    /// `transcript`: valid for active and unseen sessions alike; some
    /// platforms deliver the first fragment before `call-start`.
    fn on_transcript(
        &self,
        external_call_id: &str,
        role: &str,
        text: &str,
    ) -> Result<WebhookReply> {
        let session = self.calls.resolve_or_create(external_call_id)?;

        let speaker = Speaker::from_platform_role(role);
        match self.transcripts.append(&session.id, speaker, text)? {
            Some(utterance) => {
                tracing::debug!(
                    external_call_id,
                    speaker = ?speaker,
                    chars = utterance.text.len(),
                    "utterance appended"
                );
            }
            None => {
                tracing::debug!(external_call_id, "empty transcript fragment discarded");
            }
        }

        Ok(WebhookReply::ack())
    }

    /// `function-call`: stateless with respect to session status
    fn on_function_call(&self, name: &str, tool_call_id: Option<String>) -> WebhookReply {
        if name != TRANSFER_FUNCTION {
            tracing::debug!(function = name, "unhandled function call acknowledged");
            return WebhookReply::ack();
        }

        tracing::info!(number = %self.dispatcher_number, "transfer requested");
        WebhookReply::Transfer(TransferResponse {
            results: vec![ToolCallResult {
                tool_call_id,
                result: format!(
                    "Transferring the call to the dispatcher at {}.",
                    self.dispatcher_number
                ),
            }],
            destination: TransferDestination {
                kind: "number",
                number: self.dispatcher_number.clone(),
                message: "Connecting you to an emergency dispatcher.".to_string(),
            },
        })
    }

    /// `call-end`: active -> completed, idempotent. An identifier this
    /// service has never seen is a no-op; no session is fabricated for a
    /// call that never existed.
    fn on_call_end(&self, external_call_id: &str) -> Result<WebhookReply> {
        match self.calls.get(external_call_id)? {
            Some(session) => {
                self.calls.mark_completed(&session.id)?;
                tracing::info!(external_call_id, session = %session.id, "call completed");
            }
            None => {
                tracing::warn!(external_call_id, "call-end for unknown call ignored");
            }
        }

        Ok(WebhookReply::ack())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CallStatus, init_memory};

    fn setup() -> (LifecycleManager, CallRepo, TranscriptRepo) {
        let pool = init_memory().unwrap();
        let calls = CallRepo::new(pool.clone());
        let transcripts = TranscriptRepo::new(pool);
        let manager = LifecycleManager::new(
            calls.clone(),
            transcripts.clone(),
            "+15550001111".to_string(),
        );
        (manager, calls, transcripts)
    }

    #[test]
    fn test_call_start_activates_and_configures() {
        let (manager, calls, _) = setup();

        let reply = manager
            .handle(CallEvent::CallStart {
                call_id: "call_1".to_string(),
            })
            .unwrap();

        let session = calls.get("call_1").unwrap().unwrap();
        assert_eq!(session.status, CallStatus::Active);

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["assistant"]["forwardingPhoneNumber"], "+15550001111");
        assert_eq!(json["assistant"]["functions"][0]["name"], "transferCall");
        assert_eq!(json["assistant"]["transcriber"]["provider"], "deepgram");
    }

    #[test]
    fn test_call_start_redelivery_still_configures() {
        let (manager, calls, _) = setup();

        let event = CallEvent::CallStart {
            call_id: "call_1".to_string(),
        };
        manager.handle(event.clone()).unwrap();
        let reply = manager.handle(event).unwrap();

        assert!(matches!(reply, WebhookReply::AssistantConfig(_)));
        assert_eq!(calls.count_for_external_id("call_1").unwrap(), 1);
    }

    #[test]
    fn test_transcript_creates_unseen_session() {
        let (manager, calls, transcripts) = setup();

        let reply = manager
            .handle(CallEvent::Transcript {
                call_id: "call_77".to_string(),
                role: "user".to_string(),
                text: "He hit me again... I'm bleeding. I'm hiding.".to_string(),
            })
            .unwrap();

        let session = calls.get("call_77").unwrap().unwrap();
        assert_eq!(session.status, CallStatus::Active);

        let utterances = transcripts.list(&session.id).unwrap();
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].speaker, Speaker::Caller);

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn test_empty_transcript_is_noop() {
        let (manager, calls, transcripts) = setup();

        manager
            .handle(CallEvent::Transcript {
                call_id: "call_e".to_string(),
                role: "user".to_string(),
                text: "   ".to_string(),
            })
            .unwrap();

        let session = calls.get("call_e").unwrap().unwrap();
        assert_eq!(transcripts.count(&session.id).unwrap(), 0);
    }

    #[test]
    fn test_dispatcher_role_normalized() {
        let (manager, calls, transcripts) = setup();

        manager
            .handle(CallEvent::Transcript {
                call_id: "call_d".to_string(),
                role: "assistant".to_string(),
                text: "Stay calm, help is on the way.".to_string(),
            })
            .unwrap();

        let session = calls.get("call_d").unwrap().unwrap();
        let utterances = transcripts.list(&session.id).unwrap();
        assert_eq!(utterances[0].speaker, Speaker::Dispatcher);
    }

    #[test]
    fn test_transfer_function_call_correlates_tool_id() {
        let (manager, _, _) = setup();

        let reply = manager
            .handle(CallEvent::FunctionCall {
                name: TRANSFER_FUNCTION.to_string(),
                tool_call_id: Some("tool_42".to_string()),
            })
            .unwrap();

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["results"][0]["toolCallId"], "tool_42");
        assert_eq!(json["destination"]["number"], "+15550001111");
        assert_eq!(json["destination"]["type"], "number");
    }

    #[test]
    fn test_other_function_call_acks() {
        let (manager, _, _) = setup();

        let reply = manager
            .handle(CallEvent::FunctionCall {
                name: "lookupUnit".to_string(),
                tool_call_id: None,
            })
            .unwrap();

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn test_call_end_is_idempotent() {
        let (manager, calls, _) = setup();

        manager
            .handle(CallEvent::CallStart {
                call_id: "call_z".to_string(),
            })
            .unwrap();

        let end = CallEvent::CallEnd {
            call_id: "call_z".to_string(),
        };
        manager.handle(end.clone()).unwrap();
        manager.handle(end).unwrap();

        let session = calls.get("call_z").unwrap().unwrap();
        assert_eq!(session.status, CallStatus::Completed);
    }

    #[test]
    fn test_call_end_for_unseen_call_is_noop() {
        let (manager, calls, _) = setup();

        let reply = manager
            .handle(CallEvent::CallEnd {
                call_id: "never_seen".to_string(),
            })
            .unwrap();

        assert!(matches!(reply, WebhookReply::Ack(_)));
        assert!(calls.get("never_seen").unwrap().is_none());
    }
}
