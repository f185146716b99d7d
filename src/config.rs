//! Configuration management for Halo dispatch
//!
//! All options are environment-supplied; the webhook secret and dispatcher
//! number come straight from the platform dashboard and the on-call rota.

use std::path::PathBuf;

/// Placeholder forwarding number used until a real dispatcher line is
/// configured. Calls forwarded here go nowhere.
pub const PLACEHOLDER_DISPATCHER_NUMBER: &str = "+1234567890";

/// Default SQLite database path
pub const DEFAULT_DB_PATH: &str = "halo_dispatch.db";

/// Halo dispatch configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret for webhook signature verification.
    /// `None` disables verification entirely (insecure mode).
    pub webhook_secret: Option<String>,

    /// Dispatcher forwarding phone number (E.164)
    pub dispatcher_number: String,

    /// `OpenAI` API key for the triage gateway.
    /// `None` means triage requests fall back to the neutral default.
    pub openai_api_key: Option<String>,

    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Port the HTTP server listens on
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment
    #[must_use]
    pub fn from_env() -> Self {
        let webhook_secret = std::env::var("VAPI_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let dispatcher_number = std::env::var("DISPATCHER_PHONE_NUMBER")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_DISPATCHER_NUMBER.to_string());

        let db_path = std::env::var("HALO_DB_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from);

        let port = std::env::var("HALO_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        Self {
            webhook_secret,
            dispatcher_number,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            db_path,
            port,
        }
    }

    /// Log warnings for configuration gaps that weaken the deployment
    pub fn warn_on_gaps(&self) {
        if self.webhook_secret.is_none() {
            tracing::warn!("VAPI_WEBHOOK_SECRET not set: webhook signature verification disabled");
        }
        if self.dispatcher_number == PLACEHOLDER_DISPATCHER_NUMBER {
            tracing::warn!(
                number = PLACEHOLDER_DISPATCHER_NUMBER,
                "DISPATCHER_PHONE_NUMBER not set: forwarding calls to a placeholder number"
            );
        }
        if self.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set: triage requests will return the unscored default");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_number_is_e164_shaped() {
        assert!(PLACEHOLDER_DISPATCHER_NUMBER.starts_with('+'));
        assert!(
            PLACEHOLDER_DISPATCHER_NUMBER[1..]
                .chars()
                .all(|c| c.is_ascii_digit())
        );
    }
}
