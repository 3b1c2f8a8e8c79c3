//! JSON API for the review page.
//!
//! Endpoints:
//!
//! | Method | Path                     | Purpose                                  |
//! |--------|--------------------------|------------------------------------------|
//! | GET    | `/api/health`            | liveness, pending-review flag, run count |
//! | GET    | `/api/review`            | the pending review, if any               |
//! | POST   | `/api/review`            | approve, edit or reject the pending draft |
//! | POST   | `/api/runs`              | start a run for a customer message       |
//! | GET    | `/api/runs/current`      | the most recent run                      |
//! | GET    | `/api/runs/{id}`         | one run                                  |
//! | GET    | `/api/scenarios`         | built-in demo scenarios                  |
//! | POST   | `/api/scenarios/{index}` | start a run for a scenario               |
//! | GET    | `/api/metrics`           | latency statistics and run summary       |
//! | GET    | `/api/events`            | SSE stream of pipeline events            |
//! | POST   | `/api/reset`             | clear the run board and metrics          |

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use replyline_core::customer::CustomerMessage;
use replyline_core::error::ReviewError;
use replyline_pipeline::{ReviewDecision, ReviewTicket, SCENARIOS, scenario};
use replyline_telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::SharedState;
use crate::board::RunView;

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/review", get(get_review_handler).post(submit_review_handler))
        .route("/runs", post(start_run_handler))
        .route("/runs/current", get(current_run_handler))
        .route("/runs/{id}", get(get_run_handler))
        .route("/scenarios", get(list_scenarios_handler))
        .route("/scenarios/{index}", post(start_scenario_handler))
        .route("/metrics", get(metrics_handler))
        .route("/events", get(event_stream_handler))
        .route("/reset", post(reset_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    review_pending: bool,
    runs: usize,
    uptime_secs: i64,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ReviewResponse {
    Pending(ReviewTicket),
    NoReviews,
}

#[derive(Deserialize)]
struct ReviewRequest {
    token: String,
    #[serde(default)]
    edited_response: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    reject: bool,
}

impl ReviewRequest {
    fn into_decision(self) -> ReviewDecision {
        let decision = if self.reject {
            ReviewDecision::reject()
        } else {
            match self.edited_response {
                Some(text) => ReviewDecision::edit(text),
                None => ReviewDecision::approve(),
            }
        };
        match self.notes {
            Some(notes) => decision.with_notes(notes),
            None => decision,
        }
    }
}

#[derive(Serialize)]
struct ReviewAccepted {
    status: &'static str,
    run_id: String,
}

#[derive(Deserialize)]
struct RunRequest {
    input: String,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
}

#[derive(Serialize)]
struct RunStarted {
    status: &'static str,
    run_id: String,
}

#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
    runs_cleared: usize,
}

#[derive(Serialize)]
struct ScenarioDto {
    index: usize,
    name: &'static str,
    description: &'static str,
    text: &'static str,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        review_pending: state.desk.is_pending().await,
        runs: state.board.len().await,
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

async fn get_review_handler(State(state): State<SharedState>) -> Json<ReviewResponse> {
    Json(match state.desk.pending().await {
        Some(ticket) => ReviewResponse::Pending(ticket),
        None => ReviewResponse::NoReviews,
    })
}

async fn submit_review_handler(
    State(state): State<SharedState>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ReviewAccepted>, ApiError> {
    let token = req.token.clone();
    let decision = req.into_decision();

    match state.desk.decide(&token, decision).await {
        Ok(run_id) => Ok(Json(ReviewAccepted {
            status: "accepted",
            run_id: run_id.to_string(),
        })),
        Err(e @ ReviewError::UnknownToken(_)) => {
            warn!(error = %e, "Review decision refused");
            Err(api_error(StatusCode::NOT_FOUND, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::GONE, e.to_string())),
    }
}

async fn start_run_handler(
    State(state): State<SharedState>,
    Json(req): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunStarted>), ApiError> {
    if req.input.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "input must not be empty"));
    }

    let mut message = CustomerMessage::new(req.input.trim());
    if let Some(id) = req.customer_id.filter(|s| !s.trim().is_empty()) {
        message = message.with_customer_id(id);
    }
    if let Some(id) = req.order_id.filter(|s| !s.trim().is_empty()) {
        message = message.with_order_id(id);
    }
    if let Some(urgency) = req.urgency.filter(|s| !s.trim().is_empty()) {
        message = message.with_urgency(urgency);
    }

    Ok((StatusCode::ACCEPTED, Json(start(&state, message))))
}

async fn start_scenario_handler(
    State(state): State<SharedState>,
    Path(index): Path<usize>,
) -> Result<(StatusCode, Json<RunStarted>), ApiError> {
    let scenario = scenario(index).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("No scenario {index}; {} available", SCENARIOS.len()),
        )
    })?;
    info!(scenario = scenario.name, "Starting demo scenario");
    Ok((StatusCode::ACCEPTED, Json(start(&state, scenario.message()))))
}

fn start(state: &SharedState, message: CustomerMessage) -> RunStarted {
    let (run_id, _handle) = state.orchestrator.spawn(message, state.desk.clone());
    RunStarted {
        status: "started",
        run_id: run_id.to_string(),
    }
}

async fn current_run_handler(
    State(state): State<SharedState>,
) -> Result<Json<RunView>, ApiError> {
    state
        .board
        .current()
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No runs yet"))
}

async fn get_run_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    state
        .board
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown run {id}")))
}

async fn list_scenarios_handler() -> Json<Vec<ScenarioDto>> {
    Json(
        SCENARIOS
            .iter()
            .enumerate()
            .map(|(index, s)| ScenarioDto {
                index,
                name: s.name,
                description: s.description,
                text: s.text,
            })
            .collect(),
    )
}

async fn metrics_handler(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// `POST /api/reset`: forget finished runs and start metrics afresh.
///
/// Refused while a review is pending or any run is still in flight.
async fn reset_handler(
    State(state): State<SharedState>,
) -> Result<Json<ResetResponse>, ApiError> {
    if state.desk.is_pending().await {
        return Err(api_error(
            StatusCode::CONFLICT,
            "A review is pending; decide it before resetting",
        ));
    }
    let in_flight = state.board.in_flight().await;
    if in_flight > 0 {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("{in_flight} run(s) still in flight"),
        ));
    }

    let runs_cleared = state.board.clear().await;
    state.metrics.reset();
    info!(runs_cleared, "Run board and metrics reset");
    Ok(Json(ResetResponse {
        status: "reset",
        runs_cleared,
    }))
}

/// `GET /api/events`: SSE stream of pipeline events.
async fn event_stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.bus.subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.name()).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
