//! End-to-end tests for the Replyline pipeline.
//!
//! These drive customer messages through every stage, the review desk, and
//! the HTTP review server, with a scripted provider standing in for the
//! hosted models.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use replyline_config::AppConfig;
use replyline_core::event::EventBus;
use replyline_core::run::{PipelineRun, RunStatus, StageName};
use replyline_core::testing::ScriptedProvider;
use replyline_gateway::{AppState, build_router, spawn_recorder};
use replyline_pipeline::{Orchestrator, ReviewDecision, ReviewDesk, SCENARIOS, Step};
use replyline_providers::ModelClient;
use serde_json::{Value, json};
use tower::ServiceExt;

// ── Helpers ──────────────────────────────────────────────────────────────

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.models.guard.model = "guard".into();
    config.models.response.model = "response".into();
    config.models.tone.model = "tone".into();
    config.models.rewrite.model = "rewrite".into();
    config
}

fn orchestrator(provider: ScriptedProvider) -> (Orchestrator, Arc<ScriptedProvider>) {
    let provider = Arc::new(provider);
    let client = ModelClient::new(provider.clone());
    let orchestrator = Orchestrator::from_config(client, &config(), Arc::new(EventBus::default()));
    (orchestrator, provider)
}

fn assert_prefix_of_canonical(run: &PipelineRun) {
    let stages = run.executed_stages();
    let positions: Vec<usize> = stages.iter().map(StageName::index).collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "stage order broken: {stages:?}"
    );
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    while !check().await {
        tokio::task::yield_now().await;
    }
}

const DRAFT: &str = "I'm sorry your order hasn't arrived yet. I've checked and it is out for delivery today; you'll receive tracking details shortly.";

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn late_order_completes_with_unedited_draft() {
    let (orch, provider) = orchestrator(
        ScriptedProvider::default()
            .with_model("guard", ["SAFE", "SAFE"])
            .with_model("response", [DRAFT])
            .with_model("tone", ["PASS"]),
    );
    let desk = Arc::new(ReviewDesk::default());

    let (_, handle) = orch.spawn(SCENARIOS[0].message(), desk.clone());
    wait_until(|| async { desk.is_pending().await }).await;

    let ticket = desk.pending().await.unwrap();
    assert_eq!(ticket.customer_input, SCENARIOS[0].text);
    desk.decide(&ticket.token, ReviewDecision::approve())
        .await
        .unwrap();

    let run = handle.await.unwrap();
    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(run.final_response(), Some(DRAFT));
    assert!(run.stage(StageName::Rewrite).is_none());
    assert_prefix_of_canonical(&run);
    assert_eq!(provider.call_count(), 4);

    // Customer-facing prompt carries the brand and the message.
    let generation = &provider.requests()[1];
    assert!(generation.system[0].contains("Your Company"));
    assert!(generation.user.contains(SCENARIOS[0].text));
}

#[tokio::test]
async fn abusive_customer_never_reaches_generation() {
    let (orch, provider) = orchestrator(
        ScriptedProvider::default().with_model("guard", ["unsafe\nO1,O7"]),
    );

    let Step::Halted(run) = orch.begin(SCENARIOS[2].message()).await else {
        panic!("abusive input must halt before review");
    };
    assert_eq!(run.status(), RunStatus::Rejected);
    assert_eq!(run.executed_stages(), vec![StageName::InitialSafety]);
    assert!(run.draft().is_none());
    assert_eq!(provider.models_called(), vec!["guard"]);
}

#[tokio::test]
async fn tone_failure_rewrites_once_and_ships_rewrite() {
    let (orch, provider) = orchestrator(
        ScriptedProvider::default()
            .with_model("guard", ["SAFE", "SAFE"])
            .with_model("response", ["Chill, we'll get to it whenever."])
            .with_model(
                "tone",
                ["FAIL: casual_language, dismissive_language | \"Chill\", \"whenever\""],
            )
            .with_model(
                "rewrite",
                ["I understand your frustration and will prioritise your request today."],
            ),
    );

    let Step::AwaitingReview(suspended) = orch.begin(SCENARIOS[1].message()).await else {
        panic!("expected review");
    };
    let run = orch.resume(suspended, ReviewDecision::approve()).await;

    assert_eq!(run.status(), RunStatus::Completed);
    assert_eq!(
        run.final_response(),
        Some("I understand your frustration and will prioritise your request today.")
    );

    let rewrite = provider
        .requests()
        .into_iter()
        .find(|r| r.model == "rewrite")
        .unwrap();
    assert!(rewrite.system[0].contains("- \"Chill\"\n- \"whenever\""));
    assert!(rewrite.system[0].contains("SPECIFIC IMPROVEMENTS NEEDED"));
    assert_eq!(
        provider.models_called().iter().filter(|m| *m == "tone").count(),
        1,
        "the rewrite is not re-validated"
    );
}

// ── Review server ────────────────────────────────────────────────────────

async fn call(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn scenario_reviewed_with_edit_over_http() {
    let (orch, provider) = orchestrator(
        ScriptedProvider::default()
            .with_model("guard", ["SAFE", "SAFE"])
            .with_model("response", [DRAFT])
            .with_model("tone", ["PASS"]),
    );
    let state = Arc::new(AppState::new(orch, Arc::new(ReviewDesk::default())));
    spawn_recorder(&state);
    let app = build_router(state.clone());

    let (status, started) = call(app.clone(), "POST", "/api/scenarios/0", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = started["run_id"].as_str().unwrap().to_string();

    wait_until(|| async { state.desk.is_pending().await }).await;
    let (_, review) = call(app.clone(), "GET", "/api/review", None).await;
    assert_eq!(review["status"], "pending");
    assert_eq!(review["run_id"], run_id.as_str());

    let edited = "Your order is out for delivery today. Thank you for your patience.";
    let (status, _) = call(
        app.clone(),
        "POST",
        "/api/review",
        Some(json!({
            "token": review["token"],
            "edited_response": edited,
            "notes": "tightened wording",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    wait_until(|| async {
        state
            .board
            .get(&run_id)
            .await
            .is_some_and(|v| v.finished_at.is_some())
    })
    .await;

    let (_, run) = call(app.clone(), "GET", &format!("/api/runs/{run_id}"), None).await;
    assert_eq!(run["status"], "completed");
    assert_eq!(run["final_response"], edited);
    assert_eq!(run["review"]["edited"], true);
    assert_eq!(run["review"]["notes"], "tightened wording");

    // Post-review checks saw the edited text, not the draft.
    assert!(provider.requests()[2].user.ends_with(edited));

    let (_, metrics) = call(app, "GET", "/api/metrics", None).await;
    assert_eq!(metrics["summary"]["completed"], 1);
    assert_eq!(metrics["summary"]["edited_by_reviewer"], 1);
    assert_eq!(metrics["human_review"]["count"], 1);
}

#[tokio::test]
async fn second_run_waiting_for_review_fails_busy() {
    let (orch, _) = orchestrator(
        ScriptedProvider::default()
            .with_model("guard", ["SAFE", "SAFE"])
            .with_model("response", [DRAFT, DRAFT]),
    );
    let desk = Arc::new(ReviewDesk::default());

    let (first_id, first) = orch.spawn(SCENARIOS[0].message(), desk.clone());
    wait_until(|| async { desk.is_pending().await }).await;

    let (_, second) = orch.spawn(SCENARIOS[1].message(), desk.clone());
    let second = second.await.unwrap();
    assert_eq!(second.status(), RunStatus::Failed);
    assert!(second.halt_reason().unwrap().contains(first_id.as_str()));

    let ticket = desk.pending().await.unwrap();
    assert_eq!(ticket.run_id, first_id);
    desk.decide(&ticket.token, ReviewDecision::reject())
        .await
        .unwrap();
    assert_eq!(first.await.unwrap().status(), RunStatus::Rejected);
}
