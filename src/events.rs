//! Webhook event classification
//!
//! The platform posts one envelope per event: a `message` object whose
//! `type` field discriminates the event kind, and a `call` object carrying
//! the platform-issued call identifier. The four kinds this service acts on
//! form a closed enum; anything else degrades to [`CallEvent::Unrecognized`]
//! so the platform's event vocabulary can grow without breaking deliveries.

use serde::Deserialize;

use crate::{Error, Result};

/// Raw webhook envelope
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub message: EventMessage,
    pub call: Option<CallRef>,
}

/// Reference to the platform call an event belongs to
#[derive(Debug, Deserialize)]
pub struct CallRef {
    pub id: String,
}

/// Discriminated event message
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventMessage {
    CallStart,
    CallEnd,
    Transcript {
        transcript: TranscriptPayload,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionPayload,
    },
    #[serde(other)]
    Unknown,
}

/// Transcript fragment payload
#[derive(Debug, Deserialize)]
pub struct TranscriptPayload {
    pub role: String,
    pub text: String,
}

/// Function invocation payload
#[derive(Debug, Deserialize)]
pub struct FunctionPayload {
    pub name: String,
    /// Tool-call identifier echoed back so the platform can correlate the
    /// response
    pub id: Option<String>,
}

/// A classified event, with the call identifier resolved where the event
/// kind requires one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    CallStart {
        call_id: String,
    },
    CallEnd {
        call_id: String,
    },
    Transcript {
        call_id: String,
        role: String,
        text: String,
    },
    FunctionCall {
        name: String,
        tool_call_id: Option<String>,
    },
    /// Discriminator outside the known vocabulary; acknowledged without
    /// further processing
    Unrecognized,
}

/// Classify a raw webhook body.
///
/// # Errors
///
/// Returns [`Error::MalformedEvent`] for unparseable JSON, a structurally
/// invalid envelope, or a missing call identifier on an event kind that
/// requires one. A missing or unknown discriminator is not an error.
pub fn classify(body: &[u8]) -> Result<CallEvent> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedEvent(format!("invalid JSON: {e}")))?;

    // An absent message or discriminator is vocabulary we don't know yet,
    // not a malformed delivery.
    let has_type = value
        .get("message")
        .and_then(|m| m.get("type"))
        .is_some_and(serde_json::Value::is_string);
    if !has_type {
        return Ok(CallEvent::Unrecognized);
    }

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| Error::MalformedEvent(format!("invalid envelope: {e}")))?;

    let call_id = |kind: &str| {
        envelope
            .call
            .as_ref()
            .map(|c| c.id.clone())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedEvent(format!("{kind} event missing call.id")))
    };

    match envelope.message {
        EventMessage::CallStart => Ok(CallEvent::CallStart {
            call_id: call_id("call-start")?,
        }),
        EventMessage::CallEnd => Ok(CallEvent::CallEnd {
            call_id: call_id("call-end")?,
        }),
        EventMessage::Transcript { transcript } => Ok(CallEvent::Transcript {
            call_id: call_id("transcript")?,
            role: transcript.role,
            text: transcript.text,
        }),
        EventMessage::FunctionCall { function_call } => Ok(CallEvent::FunctionCall {
            name: function_call.name,
            tool_call_id: function_call.id,
        }),
        EventMessage::Unknown => Ok(CallEvent::Unrecognized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_call_start() {
        let body = br#"{"message":{"type":"call-start"},"call":{"id":"call_1"}}"#;
        assert_eq!(
            classify(body).unwrap(),
            CallEvent::CallStart {
                call_id: "call_1".to_string()
            }
        );
    }

    #[test]
    fn test_classify_transcript() {
        let body = br#"{
            "message": {
                "type": "transcript",
                "transcript": {"role": "user", "text": "Hello, I need help!"}
            },
            "call": {"id": "call_2"}
        }"#;
        assert_eq!(
            classify(body).unwrap(),
            CallEvent::Transcript {
                call_id: "call_2".to_string(),
                role: "user".to_string(),
                text: "Hello, I need help!".to_string()
            }
        );
    }

    #[test]
    fn test_classify_function_call() {
        let body = br#"{
            "message": {
                "type": "function-call",
                "functionCall": {"name": "transferCall", "id": "tool_9"}
            },
            "call": {"id": "call_3"}
        }"#;
        assert_eq!(
            classify(body).unwrap(),
            CallEvent::FunctionCall {
                name: "transferCall".to_string(),
                tool_call_id: Some("tool_9".to_string())
            }
        );
    }

    #[test]
    fn test_classify_call_end() {
        let body = br#"{"message":{"type":"call-end"},"call":{"id":"call_4"}}"#;
        assert_eq!(
            classify(body).unwrap(),
            CallEvent::CallEnd {
                call_id: "call_4".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_discriminator_is_unrecognized() {
        let body = br#"{"message":{"type":"speech-update"},"call":{"id":"call_5"}}"#;
        assert_eq!(classify(body).unwrap(), CallEvent::Unrecognized);
    }

    #[test]
    fn test_missing_discriminator_is_unrecognized() {
        assert_eq!(
            classify(br#"{"message":{},"call":{"id":"c"}}"#).unwrap(),
            CallEvent::Unrecognized
        );
        assert_eq!(classify(br"{}").unwrap(), CallEvent::Unrecognized);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = classify(b"not json").unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
    }

    #[test]
    fn test_missing_call_id_is_malformed() {
        let body = br#"{"message":{"type":"call-start"}}"#;
        assert!(matches!(
            classify(body).unwrap_err(),
            Error::MalformedEvent(_)
        ));

        let body = br#"{"message":{"type":"transcript","transcript":{"role":"user","text":"hi"}},"call":{"id":""}}"#;
        assert!(matches!(
            classify(body).unwrap_err(),
            Error::MalformedEvent(_)
        ));
    }

    #[test]
    fn test_function_call_without_call_id_is_fine() {
        let body = br#"{"message":{"type":"function-call","functionCall":{"name":"lookupUnit"}}}"#;
        assert_eq!(
            classify(body).unwrap(),
            CallEvent::FunctionCall {
                name: "lookupUnit".to_string(),
                tool_call_id: None
            }
        );
    }

    #[test]
    fn test_transcript_missing_payload_is_malformed() {
        let body = br#"{"message":{"type":"transcript"},"call":{"id":"call_6"}}"#;
        assert!(matches!(
            classify(body).unwrap_err(),
            Error::MalformedEvent(_)
        ));
    }
}
