//! HTTP API server for Halo dispatch

pub mod health;
pub mod triage;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{CallRepo, DbPool, InsightRepo, TranscriptRepo};
use crate::lifecycle::LifecycleManager;
use crate::triage::{OpenAiTriage, TriageGateway, TriageService};
use crate::{Config, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    /// Shared secret for webhook signature verification; `None` disables it
    pub webhook_secret: Option<String>,
    pub lifecycle: LifecycleManager,
    pub triage: TriageService,
}

impl ApiState {
    /// Wire up repositories and adapters from configuration. Everything is
    /// constructed here and owned by the state — no global clients.
    #[must_use]
    pub fn new(config: &Config, db: DbPool) -> Self {
        let calls = CallRepo::new(db.clone());
        let transcripts = TranscriptRepo::new(db.clone());
        let insights = InsightRepo::new(db.clone());

        let gateway: Option<Arc<dyn TriageGateway>> = config
            .openai_api_key
            .clone()
            .map(|key| Arc::new(OpenAiTriage::new(key)) as Arc<dyn TriageGateway>);

        let lifecycle = LifecycleManager::new(
            calls.clone(),
            transcripts.clone(),
            config.dispatcher_number.clone(),
        );
        let triage = TriageService::new(gateway, calls, transcripts, insights);

        Self {
            db,
            webhook_secret: config.webhook_secret.clone(),
            lifecycle,
            triage,
        }
    }
}

/// Build the router with all routes
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    let router = Router::new()
        .nest("/webhook", webhooks::router(state.clone()))
        .nest("/api/ai", triage::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state));

    // CORS layer for the dispatch dashboard frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a new API server
    #[must_use]
    pub fn new(config: &Config, db: DbPool) -> Self {
        Self {
            state: Arc::new(ApiState::new(config, db)),
            port: config.port,
        }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
