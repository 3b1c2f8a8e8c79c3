//! Read-mostly view of recent runs, rebuilt from pipeline events.

use chrono::{DateTime, Utc};
use replyline_core::event::DomainEvent;
use replyline_core::run::{PipelineRun, ReviewRecord, RunStatus, StageRecord};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Maximum number of runs kept before the oldest are evicted.
const MAX_RUNS: usize = 500;

/// What the page shows for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    pub id: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewRecord>,
    pub ai_latency_ms: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&PipelineRun> for RunView {
    fn from(run: &PipelineRun) -> Self {
        Self {
            id: run.id.to_string(),
            input: run.message.text().to_string(),
            customer_id: run.message.customer_id().map(String::from),
            status: run.status(),
            stages: run.stages().to_vec(),
            final_response: run.final_response().map(String::from),
            halt_reason: run.halt_reason().map(String::from),
            review: run.review().cloned(),
            ai_latency_ms: run.ai_latency_ms(),
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

#[derive(Default)]
struct Runs {
    by_id: HashMap<String, RunView>,
    order: VecDeque<String>,
}

#[derive(Default)]
pub struct RunBoard {
    runs: RwLock<Runs>,
}

impl RunBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply(&self, event: &DomainEvent) {
        let mut runs = self.runs.write().await;
        match event {
            DomainEvent::RunStarted {
                run_id,
                message,
                timestamp,
            } => {
                if runs.order.len() >= MAX_RUNS {
                    if let Some(oldest) = runs.order.pop_front() {
                        runs.by_id.remove(&oldest);
                    }
                }
                runs.order.push_back(run_id.clone());
                runs.by_id.insert(
                    run_id.clone(),
                    RunView {
                        id: run_id.clone(),
                        input: message.text().to_string(),
                        customer_id: message.customer_id().map(String::from),
                        status: RunStatus::Running,
                        stages: Vec::new(),
                        final_response: None,
                        halt_reason: None,
                        review: None,
                        ai_latency_ms: 0.0,
                        started_at: *timestamp,
                        finished_at: None,
                    },
                );
            }
            DomainEvent::StageCompleted { run_id, record } => {
                if let Some(view) = runs.by_id.get_mut(run_id) {
                    if record.stage.is_model_call() {
                        view.ai_latency_ms += record.latency_ms;
                    }
                    view.stages.push(record.clone());
                }
            }
            DomainEvent::StatusChanged { run_id, status, .. } => {
                if let Some(view) = runs.by_id.get_mut(run_id) {
                    view.status = *status;
                }
            }
            DomainEvent::ReviewRequested { .. } => {}
            DomainEvent::RunFinished { run } => {
                let id = run.id.to_string();
                let view = RunView::from(run.as_ref());
                if let Some(existing) = runs.by_id.get_mut(&id) {
                    *existing = view;
                } else if runs.order.len() < MAX_RUNS {
                    // Started before everything still on the board.
                    runs.order.push_front(id.clone());
                    runs.by_id.insert(id, view);
                }
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<RunView> {
        self.runs.read().await.by_id.get(id).cloned()
    }

    /// The most recently started run.
    pub async fn current(&self) -> Option<RunView> {
        let runs = self.runs.read().await;
        runs.order.back().and_then(|id| runs.by_id.get(id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.by_id.len()
    }

    /// Runs on the board that have not reached a terminal status.
    pub async fn in_flight(&self) -> usize {
        let runs = self.runs.read().await;
        runs.by_id.values().filter(|v| !v.status.is_terminal()).count()
    }

    /// Drop every run, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let mut runs = self.runs.write().await;
        let removed = runs.by_id.len();
        *runs = Runs::default();
        removed
    }
}
