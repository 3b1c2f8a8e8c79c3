//! The review desk: one pending-review slot shared by every run.
//!
//! A suspended run parks here; an operator (web page or terminal) looks at
//! the ticket and submits a decision against its token. The run's task waits
//! on a oneshot channel, so nothing blocks a thread while a human thinks.

use chrono::{DateTime, Utc};
use replyline_config::{PipelineConfig, ReviewTimeoutPolicy};
use replyline_core::error::ReviewError;
use replyline_core::run::{RunId, StageRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

use crate::orchestrator::SuspendedRun;

/// What the operator did with the draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Edit { text: String },
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    #[serde(flatten)]
    pub action: ReviewAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Set when the desk decided on the operator's behalf after this many
    /// seconds.
    #[serde(skip)]
    pub timed_out_after: Option<u64>,
}

impl ReviewDecision {
    pub fn approve() -> Self {
        Self {
            action: ReviewAction::Approve,
            notes: None,
            timed_out_after: None,
        }
    }

    /// Approve with replacement text. Blank text approves the draft as is.
    pub fn edit(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::approve();
        }
        Self {
            action: ReviewAction::Edit { text },
            notes: None,
            timed_out_after: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            action: ReviewAction::Reject,
            notes: None,
            timed_out_after: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        if !notes.trim().is_empty() {
            self.notes = Some(notes);
        }
        self
    }

    pub fn is_approval(&self) -> bool {
        !matches!(self.action, ReviewAction::Reject)
    }

    /// The text that continues down the pipeline.
    pub fn approved_text<'a>(&'a self, draft: &'a str) -> &'a str {
        match &self.action {
            ReviewAction::Edit { text } => text.trim(),
            _ => draft,
        }
    }
}

/// What an operator sees for the pending run.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewTicket {
    pub token: String,
    pub run_id: RunId,
    pub customer_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub draft: String,
    pub stages: Vec<StageRecord>,
    pub requested_at: DateTime<Utc>,
}

impl ReviewTicket {
    fn from_suspended(suspended: &SuspendedRun) -> Self {
        let run = suspended.run();
        Self {
            token: suspended.token().to_string(),
            run_id: run.id.clone(),
            customer_input: run.message.text().to_string(),
            customer_id: run.message.customer_id().map(String::from),
            draft: suspended.draft().to_string(),
            stages: run.stages().to_vec(),
            requested_at: Utc::now(),
        }
    }
}

struct PendingReview {
    ticket: ReviewTicket,
    reply: oneshot::Sender<ReviewDecision>,
}

/// Handle held by the suspended run's task while it waits.
pub struct PendingDecision {
    token: String,
    rx: oneshot::Receiver<ReviewDecision>,
}

pub struct ReviewDesk {
    pending: Mutex<Option<PendingReview>>,
    timeout: Option<Duration>,
    on_timeout: ReviewTimeoutPolicy,
}

impl ReviewDesk {
    pub fn new(timeout: Option<Duration>, on_timeout: ReviewTimeoutPolicy) -> Self {
        Self {
            pending: Mutex::new(None),
            timeout,
            on_timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.review_timeout_secs.map(Duration::from_secs),
            config.on_review_timeout,
        )
    }

    /// Park `suspended` in the slot.
    ///
    /// Refused with [`ReviewError::Busy`] while another live run holds it. A
    /// slot whose waiter went away is reclaimed.
    pub async fn open(&self, suspended: &SuspendedRun) -> Result<PendingDecision, ReviewError> {
        let mut slot = self.pending.lock().await;
        if let Some(existing) = slot.as_ref() {
            if !existing.reply.is_closed() {
                return Err(ReviewError::Busy {
                    pending_run: existing.ticket.run_id.to_string(),
                });
            }
            warn!(run_id = %existing.ticket.run_id, "Reclaiming abandoned review slot");
        }

        let (tx, rx) = oneshot::channel();
        let ticket = ReviewTicket::from_suspended(suspended);
        let token = ticket.token.clone();
        info!(run_id = %ticket.run_id, "Run awaiting human review");
        *slot = Some(PendingReview { ticket, reply: tx });

        Ok(PendingDecision { token, rx })
    }

    /// The ticket currently awaiting a decision.
    pub async fn pending(&self) -> Option<ReviewTicket> {
        self.pending
            .lock()
            .await
            .as_ref()
            .filter(|p| !p.reply.is_closed())
            .map(|p| p.ticket.clone())
    }

    pub async fn is_pending(&self) -> bool {
        self.pending().await.is_some()
    }

    /// Submit `decision` for the ticket identified by `token`.
    ///
    /// Stale or unknown tokens are refused and leave the slot untouched.
    pub async fn decide(
        &self,
        token: &str,
        decision: ReviewDecision,
    ) -> Result<RunId, ReviewError> {
        let mut slot = self.pending.lock().await;
        match slot.as_ref() {
            Some(p) if p.ticket.token == token => {}
            _ => return Err(ReviewError::UnknownToken(token.to_string())),
        }
        let Some(pending) = slot.take() else {
            return Err(ReviewError::UnknownToken(token.to_string()));
        };
        drop(slot);

        let run_id = pending.ticket.run_id;
        pending
            .reply
            .send(decision)
            .map_err(|_| ReviewError::Closed)?;
        info!(run_id = %run_id, "Review decision submitted");
        Ok(run_id)
    }

    /// Wait for the operator, applying the timeout policy if one is set.
    pub async fn wait(&self, handle: PendingDecision) -> Result<ReviewDecision, ReviewError> {
        let PendingDecision { token, mut rx } = handle;

        let Some(limit) = self.timeout else {
            return rx.await.map_err(|_| ReviewError::Closed);
        };

        match tokio::time::timeout(limit, &mut rx).await {
            Ok(received) => received.map_err(|_| ReviewError::Closed),
            Err(_) => {
                let mut slot = self.pending.lock().await;
                let ours = slot.as_ref().is_some_and(|p| p.ticket.token == token);
                if !ours {
                    // A decision landed between the timer firing and the lock.
                    drop(slot);
                    return rx.await.map_err(|_| ReviewError::Closed);
                }
                *slot = None;
                drop(slot);

                let secs = limit.as_secs();
                let note = ReviewError::TimedOut(secs).to_string();
                warn!(policy = ?self.on_timeout, "{note}");
                let decision = match self.on_timeout {
                    ReviewTimeoutPolicy::Reject => ReviewDecision::reject(),
                    ReviewTimeoutPolicy::Approve => ReviewDecision::approve(),
                };
                Ok(ReviewDecision {
                    timed_out_after: Some(secs),
                    ..decision.with_notes(note)
                })
            }
        }
    }
}

impl Default for ReviewDesk {
    fn default() -> Self {
        Self::new(None, ReviewTimeoutPolicy::default())
    }
}
