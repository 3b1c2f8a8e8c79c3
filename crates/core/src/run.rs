//! Pipeline run records.
//!
//! A [`PipelineRun`] is the mutable record of one customer message's
//! progress through the stage sequence. Stage records are append-only and
//! must follow the canonical stage order; terminal statuses absorb.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::customer::CustomerMessage;
use crate::error::{Error, Result};

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The stages of the pipeline, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    InitialSafety,
    Generation,
    HumanReview,
    PostReviewSafety,
    ToneCheck,
    Rewrite,
}

impl StageName {
    pub const CANONICAL: [StageName; 6] = [
        StageName::InitialSafety,
        StageName::Generation,
        StageName::HumanReview,
        StageName::PostReviewSafety,
        StageName::ToneCheck,
        StageName::Rewrite,
    ];

    /// Position in [`StageName::CANONICAL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSafety => "initial_safety",
            Self::Generation => "generation",
            Self::HumanReview => "human_review",
            Self::PostReviewSafety => "post_review_safety",
            Self::ToneCheck => "tone_check",
            Self::Rewrite => "rewrite",
        }
    }

    /// Every stage except the human review is one model call.
    pub fn is_model_call(&self) -> bool {
        !matches!(self, Self::HumanReview)
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageName,

    /// What the stage consumed.
    pub input: String,

    /// What the stage produced (text, or a verdict summary).
    pub output: String,

    pub latency_ms: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Verdict of check stages; `None` for generation, review and rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

impl StageRecord {
    pub fn new(
        stage: StageName,
        input: impl Into<String>,
        output: impl Into<String>,
        latency_ms: f64,
    ) -> Self {
        Self {
            stage,
            input: input.into(),
            output: output.into(),
            latency_ms,
            timestamp: Utc::now(),
            model: None,
            passed: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_passed(mut self, passed: bool) -> Self {
        self.passed = Some(passed);
        self
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    AwaitingReview,
    Completed,
    /// A safety check failed, or the operator rejected the draft.
    Rejected,
    /// A stage errored (transport, model, parse, review).
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::AwaitingReview => "awaiting_review",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    fn can_transition_to(&self, to: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, to),
            (Running, AwaitingReview)
                | (AwaitingReview, Running)
                | (Running, Completed)
                | (Running | AwaitingReview, Rejected | Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the operator did at the review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub original: String,
    pub approved: String,
    pub edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub review_ms: f64,
}

/// The record of one customer message's trip through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub message: CustomerMessage,
    stages: Vec<StageRecord>,
    status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    halt_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    review: Option<ReviewRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(message: CustomerMessage) -> Self {
        Self {
            id: RunId::new(),
            message,
            stages: Vec::new(),
            status: RunStatus::Running,
            final_response: None,
            halt_reason: None,
            review: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn stage(&self, name: StageName) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn executed_stages(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.stage).collect()
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    pub fn review(&self) -> Option<&ReviewRecord> {
        self.review.as_ref()
    }

    /// The generated draft, once the generation stage ran.
    pub fn draft(&self) -> Option<&str> {
        self.stage(StageName::Generation).map(|s| s.output.as_str())
    }

    /// Append a stage record.
    ///
    /// Rejected when the run is terminal, or when the stage does not come
    /// strictly after the last recorded one in canonical order.
    pub fn record(&mut self, record: StageRecord) -> Result<()> {
        if self.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "run {} is {}; cannot record {}",
                self.id, self.status, record.stage
            )));
        }
        if let Some(last) = self.stages.last() {
            if record.stage.index() <= last.stage.index() {
                return Err(Error::InvalidTransition(format!(
                    "{} cannot follow {} in run {}",
                    record.stage, last.stage, self.id
                )));
            }
        }
        self.stages.push(record);
        Ok(())
    }

    pub fn attach_review(&mut self, review: ReviewRecord) {
        self.review = Some(review);
    }

    pub fn await_review(&mut self) -> Result<()> {
        self.transition(RunStatus::AwaitingReview)
    }

    pub fn resume(&mut self) -> Result<()> {
        self.transition(RunStatus::Running)
    }

    pub fn complete(&mut self, final_response: impl Into<String>) -> Result<()> {
        self.transition(RunStatus::Completed)?;
        self.final_response = Some(final_response.into());
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(RunStatus::Rejected)?;
        self.halt_reason = Some(reason.into());
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(RunStatus::Failed)?;
        self.halt_reason = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, to: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidTransition(format!(
                "run {}: {} -> {}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Time spent in model calls.
    pub fn ai_latency_ms(&self) -> f64 {
        self.stages
            .iter()
            .filter(|s| s.stage.is_model_call())
            .map(|s| s.latency_ms)
            .sum()
    }

    /// Time the operator took to review, if the run got that far.
    pub fn human_latency_ms(&self) -> Option<f64> {
        self.stage(StageName::HumanReview).map(|s| s.latency_ms)
    }

    /// Wall-clock time from start to finish (or to now, while running).
    pub fn total_latency_ms(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_microseconds().unwrap_or(0) as f64 / 1000.0
    }
}
