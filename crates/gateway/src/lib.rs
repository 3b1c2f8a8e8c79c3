//! HTTP review server for Replyline.
//!
//! Serves the embedded review page and a small JSON API under `/api` for
//! starting runs, inspecting them, and deciding the pending review. A
//! background recorder task folds pipeline events into the run board and
//! the metrics recorder.
//!
//! Built on Axum.

pub mod api;
pub mod board;
pub mod frontend;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use chrono::{DateTime, Utc};
use replyline_config::AppConfig;
use replyline_core::event::{DomainEvent, EventBus};
use replyline_pipeline::{Orchestrator, ReviewDesk};
use replyline_providers::ModelClient;
use replyline_telemetry::MetricsRecorder;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use crate::board::RunBoard;

/// Shared application state for the review server.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub desk: Arc<ReviewDesk>,
    pub board: RunBoard,
    pub metrics: MetricsRecorder,
    pub bus: Arc<EventBus>,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(orchestrator: Orchestrator, desk: Arc<ReviewDesk>) -> Self {
        Self {
            bus: orchestrator.event_bus().clone(),
            metrics: MetricsRecorder::new(orchestrator.budget_ms()),
            board: RunBoard::new(),
            orchestrator,
            desk,
            started_at: Utc::now(),
        }
    }

    async fn observe(&self, event: &DomainEvent) {
        if let DomainEvent::RunFinished { run } = event {
            self.metrics.observe(run);
        }
        self.board.apply(event).await;
    }
}

/// Subscribe to the event bus and keep the board and metrics current.
///
/// The subscription is taken before this returns, so no event published
/// afterwards is missed.
pub fn spawn_recorder(state: &SharedState) -> JoinHandle<()> {
    let mut rx = state.bus.subscribe();
    let state = state.clone();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!(event = event.name(), run_id = event.run_id(), "Recording event");
                    state.observe(&event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event recorder lagged; run board may be stale");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Build the full router: review page, `/api`, and the shared layers.
///
/// Layers applied:
/// - CORS limited to localhost origins
/// - Request body size limit (64 KB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            is_local_origin(origin)
        }))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .nest("/api", api::api_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn is_local_origin(origin: &HeaderValue) -> bool {
    origin.to_str().is_ok_and(|o| {
        ["http://localhost", "http://127.0.0.1"]
            .iter()
            .any(|prefix| o == *prefix || o.starts_with(&format!("{prefix}:")))
    })
}

/// Start the review server and block until it shuts down.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_address();

    let client = ModelClient::from_config(&config)?;
    let provider = client.provider_name().to_string();
    let bus = Arc::new(EventBus::default());
    let orchestrator = Orchestrator::from_config(client, &config, bus);
    let desk = Arc::new(ReviewDesk::from_config(&config.pipeline));

    let state = Arc::new(AppState::new(orchestrator, desk));
    let recorder = spawn_recorder(&state);
    let app = build_router(state);

    info!(addr = %addr, provider = %provider, "Review server starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for shutdown signal");
            }
        })
        .await?;

    recorder.abort();
    info!("Review server stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use replyline_core::testing::ScriptedProvider;

    /// Guard passes twice, the draft is `draft`, tone passes.
    pub fn approving_script(draft: &str) -> ScriptedProvider {
        ScriptedProvider::default()
            .with_model("guard", ["SAFE", "SAFE"])
            .with_model("response", [draft])
            .with_model("tone", ["PASS"])
    }

    /// State whose agents ask for models named after their stage, with the
    /// recorder running.
    pub fn state_with(provider: ScriptedProvider) -> SharedState {
        let mut config = AppConfig::default();
        config.models.guard.model = "guard".into();
        config.models.response.model = "response".into();
        config.models.tone.model = "tone".into();
        config.models.rewrite.model = "rewrite".into();

        let client = ModelClient::new(Arc::new(provider));
        let orchestrator =
            Orchestrator::from_config(client, &config, Arc::new(EventBus::default()));
        let state = Arc::new(AppState::new(orchestrator, Arc::new(ReviewDesk::default())));
        spawn_recorder(&state);
        state
    }
}
