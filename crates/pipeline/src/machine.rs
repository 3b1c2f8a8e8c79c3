//! The pipeline's finite-state machine.
//!
//! ```text
//! InitialSafety ──fail──────────────────────────────┐
//!   │ pass                                          ▼
//! Generating ─► AwaitingReview ─reject─► ReviewRejected   UnsafeHalt
//!                 │ approve                          ▲
//!               PostReviewSafety ──fail──────────────┘
//!                 │ pass
//!               ToneCheck ─pass─► Done
//!                 │ fail            ▲
//!               Rewriting ──────────┘
//! ```
//!
//! Any stage error moves a non-terminal state to `Failed`.

use replyline_core::error::{Error, Result};
use replyline_core::run::StageName;
use replyline_core::verdict::{SafetyResult, ToneResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    InitialSafety,
    Generating,
    AwaitingReview,
    PostReviewSafety,
    ToneCheck,
    Rewriting,
    Done,
    UnsafeHalt,
    ReviewRejected,
    Failed,
}

/// What a stage produced, as far as the machine cares.
#[derive(Debug, Clone)]
pub enum StageOutcome<'a> {
    Safety(&'a SafetyResult),
    Drafted,
    Reviewed { approved: bool },
    Tone(&'a ToneResult),
    Rewritten,
    Errored,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::UnsafeHalt | Self::ReviewRejected | Self::Failed
        )
    }

    /// The stage executed in this state.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::InitialSafety => Some(StageName::InitialSafety),
            Self::Generating => Some(StageName::Generation),
            Self::AwaitingReview => Some(StageName::HumanReview),
            Self::PostReviewSafety => Some(StageName::PostReviewSafety),
            Self::ToneCheck => Some(StageName::ToneCheck),
            Self::Rewriting => Some(StageName::Rewrite),
            Self::Done | Self::UnsafeHalt | Self::ReviewRejected | Self::Failed => None,
        }
    }

    /// The state after `outcome`. Outcomes that do not belong to the current
    /// state are rejected.
    pub fn next(self, outcome: &StageOutcome<'_>) -> Result<PipelineState> {
        use PipelineState::*;

        let next = match (self, outcome) {
            (s, StageOutcome::Errored) if !s.is_terminal() => Failed,
            (InitialSafety, StageOutcome::Safety(r)) => {
                if r.passed {
                    Generating
                } else {
                    UnsafeHalt
                }
            }
            (Generating, StageOutcome::Drafted) => AwaitingReview,
            (AwaitingReview, StageOutcome::Reviewed { approved: true }) => PostReviewSafety,
            (AwaitingReview, StageOutcome::Reviewed { approved: false }) => ReviewRejected,
            (PostReviewSafety, StageOutcome::Safety(r)) => {
                if r.passed {
                    ToneCheck
                } else {
                    UnsafeHalt
                }
            }
            (ToneCheck, StageOutcome::Tone(r)) => {
                if r.passed {
                    Done
                } else {
                    Rewriting
                }
            }
            (Rewriting, StageOutcome::Rewritten) => Done,
            (state, outcome) => {
                return Err(Error::InvalidTransition(format!(
                    "{state:?} cannot accept {outcome:?}"
                )));
            }
        };
        Ok(next)
    }
}
