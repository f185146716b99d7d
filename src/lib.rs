//! Halo Dispatch - Emergency call triage gateway for AI-assisted dispatch
//!
//! This library receives call-lifecycle webhooks from a voice-call platform
//! and maintains per-call session state used to drive emergency dispatch:
//! transcript history, AI-derived urgency and concern signals, and the
//! call-forwarding instructions returned synchronously to the platform.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Voice-Call Platform                    │
//! │  call-start │ transcript │ function-call │ call-end  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ POST /webhook/vapi
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Halo Dispatch                        │
//! │  Signature │ Classifier │ Lifecycle │ Session store  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ out-of-band
//! ┌────────────────────▼────────────────────────────────┐
//! │              AI Triage Gateway                       │
//! │        urgency score  │  key concerns                │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod security;
pub mod triage;

pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use events::CallEvent;
pub use lifecycle::{LifecycleManager, WebhookReply};
pub use triage::{Concern, TriageGateway, TriageOutcome, TriageService};
