//! Shared test utilities

use std::path::PathBuf;
use std::sync::Arc;

use halo_dispatch::api::ApiState;
use halo_dispatch::db::{self, DbPool};
use halo_dispatch::Config;

/// Dispatcher number used across integration tests
pub const TEST_DISPATCHER: &str = "+15550001111";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Test configuration: no secret, no triage gateway
#[must_use]
pub fn test_config() -> Config {
    Config {
        webhook_secret: None,
        dispatcher_number: TEST_DISPATCHER.to_string(),
        openai_api_key: None,
        db_path: PathBuf::from(":memory:"),
        port: 0,
    }
}

/// Build API state over a test database
#[must_use]
pub fn build_state(db: DbPool) -> Arc<ApiState> {
    Arc::new(ApiState::new(&test_config(), db))
}

/// Build API state with webhook signature verification enabled
#[must_use]
pub fn build_state_with_secret(db: DbPool, secret: &str) -> Arc<ApiState> {
    let mut config = test_config();
    config.webhook_secret = Some(secret.to_string());
    Arc::new(ApiState::new(&config, db))
}
