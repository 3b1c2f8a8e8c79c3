//! Pipeline orchestration.
//!
//! [`Orchestrator::begin`] runs a customer message up to the human review
//! and hands back a [`SuspendedRun`]; [`Orchestrator::resume`] takes the
//! operator's decision and finishes the run. [`Orchestrator::run`] glues the
//! two together through a [`ReviewDesk`].
//!
//! Every stage is appended to the [`PipelineRun`] and published on the event
//! bus. Stage errors never escape: they terminate the run as `failed` with
//! the error recorded as the reason.

use chrono::Utc;
use replyline_agents::StageAgents;
use replyline_config::AppConfig;
use replyline_core::customer::CustomerMessage;
use replyline_core::error::{Error, Result, ReviewError};
use replyline_core::event::{DomainEvent, EventBus};
use replyline_core::run::{
    PipelineRun, ReviewRecord, RunId, RunStatus, StageName, StageRecord,
};
use replyline_core::verdict::SafetyResult;
use replyline_providers::ModelClient;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::machine::{PipelineState, StageOutcome};
use crate::review::{ReviewDecision, ReviewDesk};

/// Where [`Orchestrator::begin`] stopped.
pub enum Step {
    /// The run ended before review (unsafe input or a stage error).
    Halted(PipelineRun),
    /// The draft is ready and the run waits for an operator.
    AwaitingReview(SuspendedRun),
}

/// A run parked at the review stage.
///
/// Consumed by [`Orchestrator::resume`], so a continuation can only be
/// used once.
pub struct SuspendedRun {
    run: PipelineRun,
    token: String,
    suspended_at: Instant,
}

impl SuspendedRun {
    pub(crate) fn new(run: PipelineRun) -> Self {
        Self {
            run,
            token: Uuid::new_v4().to_string(),
            suspended_at: Instant::now(),
        }
    }

    /// Continuation token the review decision must quote.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn draft(&self) -> &str {
        self.run.draft().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    agents: Arc<StageAgents>,
    bus: Arc<EventBus>,
    budget_ms: u64,
}

impl Orchestrator {
    pub fn new(agents: StageAgents, bus: Arc<EventBus>) -> Self {
        Self {
            agents: Arc::new(agents),
            bus,
            budget_ms: 200,
        }
    }

    pub fn from_config(client: ModelClient, config: &AppConfig, bus: Arc<EventBus>) -> Self {
        Self::new(StageAgents::from_config(client, config), bus)
            .with_budget_ms(config.pipeline.max_pipeline_ms)
    }

    /// AI latency budget per run. Overruns are logged, not enforced.
    pub fn with_budget_ms(mut self, budget_ms: u64) -> Self {
        self.budget_ms = budget_ms;
        self
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Run initial safety and generation, then suspend for review.
    pub async fn begin(&self, message: CustomerMessage) -> Step {
        self.begin_run(PipelineRun::new(message)).await
    }

    async fn begin_run(&self, mut run: PipelineRun) -> Step {
        info!(run_id = %run.id, input = %run.message.preview(60), "Pipeline run started");

        self.bus.publish(DomainEvent::RunStarted {
            run_id: run.id.to_string(),
            message: run.message.clone(),
            timestamp: Utc::now(),
        });
        self.publish_status(&run);

        match self.run_until_review(&mut run).await {
            Ok(PipelineState::AwaitingReview) => {
                self.publish_status(&run);
                Step::AwaitingReview(SuspendedRun::new(run))
            }
            Ok(_) => Step::Halted(self.finish(run)),
            Err(e) => Step::Halted(self.fail(run, e)),
        }
    }

    /// Apply the operator's decision and run the remaining stages.
    pub async fn resume(&self, suspended: SuspendedRun, decision: ReviewDecision) -> PipelineRun {
        let SuspendedRun {
            mut run,
            suspended_at,
            ..
        } = suspended;
        let review_ms = suspended_at.elapsed().as_secs_f64() * 1000.0;

        match self.run_after_review(&mut run, decision, review_ms).await {
            Ok(()) => self.finish(run),
            Err(e) => self.fail(run, e),
        }
    }

    /// Fail a suspended run that will never be resumed.
    pub fn abandon(&self, suspended: SuspendedRun, reason: Error) -> PipelineRun {
        self.fail(suspended.run, reason)
    }

    /// Run a message end to end, parking it on `desk` for review.
    pub async fn run(&self, message: CustomerMessage, desk: &ReviewDesk) -> PipelineRun {
        self.drive(PipelineRun::new(message), desk).await
    }

    /// Start a run on the runtime and return its id straight away.
    pub fn spawn(
        &self,
        message: CustomerMessage,
        desk: Arc<ReviewDesk>,
    ) -> (RunId, JoinHandle<PipelineRun>) {
        let run = PipelineRun::new(message);
        let id = run.id.clone();
        let orchestrator = self.clone();
        let handle = tokio::spawn(async move { orchestrator.drive(run, &desk).await });
        (id, handle)
    }

    async fn drive(&self, run: PipelineRun, desk: &ReviewDesk) -> PipelineRun {
        let suspended = match self.begin_run(run).await {
            Step::Halted(run) => return run,
            Step::AwaitingReview(suspended) => suspended,
        };

        let handle = match desk.open(&suspended).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(run_id = %suspended.run.id, error = %e, "Review desk refused run");
                return self.abandon(suspended, e.into());
            }
        };

        self.bus.publish(DomainEvent::ReviewRequested {
            run_id: suspended.run.id.to_string(),
            token: suspended.token.clone(),
            timestamp: Utc::now(),
        });

        match desk.wait(handle).await {
            Ok(decision) => self.resume(suspended, decision).await,
            Err(e) => self.abandon(suspended, e.into()),
        }
    }

    async fn run_until_review(&self, run: &mut PipelineRun) -> Result<PipelineState> {
        let input = run.message.text().to_string();

        let safety = self.agents.guard.check(&input).await?;
        self.record(
            run,
            StageRecord::new(
                StageName::InitialSafety,
                &input,
                safety.value.summary(),
                safety.latency_ms,
            )
            .with_model(&safety.model)
            .with_passed(safety.value.passed),
        )?;
        let state = PipelineState::InitialSafety.next(&StageOutcome::Safety(&safety.value))?;
        if state == PipelineState::UnsafeHalt {
            run.reject(unsafe_reason(StageName::InitialSafety, &safety.value))?;
            return Ok(state);
        }

        let draft = self.agents.response.draft(&run.message).await?;
        self.record(
            run,
            StageRecord::new(StageName::Generation, &input, &draft.value, draft.latency_ms)
                .with_model(&draft.model),
        )?;
        let state = state.next(&StageOutcome::Drafted)?;

        run.await_review()?;
        Ok(state)
    }

    async fn run_after_review(
        &self,
        run: &mut PipelineRun,
        decision: ReviewDecision,
        review_ms: f64,
    ) -> Result<()> {
        let draft = run.draft().unwrap_or_default().to_string();
        let approved = decision.is_approval();
        let text = if approved {
            decision.approved_text(&draft).to_string()
        } else {
            String::new()
        };

        self.record(
            run,
            StageRecord::new(
                StageName::HumanReview,
                &draft,
                if approved { text.as_str() } else { "REJECTED" },
                review_ms,
            )
            .with_passed(approved),
        )?;
        run.attach_review(ReviewRecord {
            original: draft.clone(),
            approved: text.clone(),
            edited: approved && text != draft,
            notes: decision.notes.clone(),
            review_ms,
        });

        let state = PipelineState::AwaitingReview.next(&StageOutcome::Reviewed { approved })?;
        if state == PipelineState::ReviewRejected {
            let reason = match (decision.timed_out_after, &decision.notes) {
                (Some(secs), _) => ReviewError::TimedOut(secs).to_string(),
                (None, Some(notes)) => format!("Rejected by reviewer: {notes}"),
                (None, None) => "Rejected by reviewer".to_string(),
            };
            run.reject(reason)?;
            return Ok(());
        }
        run.resume()?;
        self.publish_status(run);

        let safety = self.agents.guard.check(&text).await?;
        self.record(
            run,
            StageRecord::new(
                StageName::PostReviewSafety,
                &text,
                safety.value.summary(),
                safety.latency_ms,
            )
            .with_model(&safety.model)
            .with_passed(safety.value.passed),
        )?;
        let state = state.next(&StageOutcome::Safety(&safety.value))?;
        if state == PipelineState::UnsafeHalt {
            run.reject(unsafe_reason(StageName::PostReviewSafety, &safety.value))?;
            return Ok(());
        }

        let tone = self.agents.tone.validate(&text).await?;
        self.record(
            run,
            StageRecord::new(StageName::ToneCheck, &text, tone.value.summary(), tone.latency_ms)
                .with_model(&tone.model)
                .with_passed(tone.value.passed),
        )?;
        let state = state.next(&StageOutcome::Tone(&tone.value))?;

        let final_text = if state == PipelineState::Rewriting {
            let rewrite = self.agents.rewrite.rewrite(&text, &tone.value).await?;
            self.record(
                run,
                StageRecord::new(StageName::Rewrite, &text, &rewrite.value, rewrite.latency_ms)
                    .with_model(&rewrite.model),
            )?;
            state.next(&StageOutcome::Rewritten)?;
            rewrite.value
        } else {
            text
        };

        run.complete(final_text)
    }

    fn record(&self, run: &mut PipelineRun, record: StageRecord) -> Result<()> {
        debug!(
            run_id = %run.id,
            stage = %record.stage,
            latency_ms = record.latency_ms,
            "Stage completed"
        );
        run.record(record.clone())?;
        self.bus.publish(DomainEvent::StageCompleted {
            run_id: run.id.to_string(),
            record,
        });
        Ok(())
    }

    fn publish_status(&self, run: &PipelineRun) {
        self.bus.publish(DomainEvent::StatusChanged {
            run_id: run.id.to_string(),
            status: run.status(),
            timestamp: Utc::now(),
        });
    }

    fn fail(&self, mut run: PipelineRun, err: Error) -> PipelineRun {
        error!(run_id = %run.id, kind = err.kind(), error = %err, "Pipeline run failed");
        if let Err(e) = run.fail(err.to_string()) {
            warn!(run_id = %run.id, error = %e, "Run already terminal, failure not recorded");
        }
        self.finish(run)
    }

    fn finish(&self, run: PipelineRun) -> PipelineRun {
        let ai_latency_ms = run.ai_latency_ms();
        match run.status() {
            RunStatus::Completed => {
                info!(
                    run_id = %run.id,
                    stages = run.stages().len(),
                    ai_latency_ms,
                    "Pipeline run completed"
                );
                if ai_latency_ms > self.budget_ms as f64 {
                    warn!(
                        run_id = %run.id,
                        ai_latency_ms,
                        budget_ms = self.budget_ms,
                        "AI latency over budget"
                    );
                }
            }
            RunStatus::Rejected => {
                info!(run_id = %run.id, reason = ?run.halt_reason(), "Pipeline run rejected");
            }
            _ => {}
        }

        self.publish_status(&run);
        self.bus.publish(DomainEvent::RunFinished {
            run: Box::new(run.clone()),
        });
        run
    }
}

fn unsafe_reason(stage: StageName, result: &SafetyResult) -> String {
    Error::UnsafeContent {
        stage: stage.to_string(),
        categories: result.labels(),
    }
    .to_string()
}
