//! Run-level metrics folded from finished pipeline runs.

use replyline_core::run::{PipelineRun, RunStatus, StageName};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::latency::{LatencyStats, LatencyTracker};

/// Counters over every run the recorder has seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Completed runs as a percentage of all finished runs.
    pub success_rate: f64,
    /// AI time of completed runs.
    pub ai_latency: LatencyStats,
    /// Safety checks that flagged content, before or after review.
    pub safety_issues_detected: usize,
    /// Tone failures fixed by a rewrite.
    pub tone_issues_resolved: usize,
    pub edited_by_reviewer: usize,
    /// Completed runs whose AI time exceeded the budget.
    pub budget_overruns: usize,
    pub budget_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub summary: RunSummary,
    pub stages: BTreeMap<StageName, LatencyStats>,
    /// Time operators spent on review.
    pub human_review: LatencyStats,
}

#[derive(Debug, Default)]
struct Totals {
    completed: usize,
    rejected: usize,
    failed: usize,
    safety_issues: usize,
    tone_resolved: usize,
    edited: usize,
    overruns: usize,
    ai: LatencyTracker,
    stages: BTreeMap<StageName, LatencyTracker>,
}

/// Thread-safe accumulator fed with every finished run.
pub struct MetricsRecorder {
    budget_ms: u64,
    totals: RwLock<Totals>,
}

impl MetricsRecorder {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            budget_ms,
            totals: RwLock::new(Totals::default()),
        }
    }

    /// Fold a finished run in. Runs still in flight are ignored.
    pub fn observe(&self, run: &PipelineRun) {
        if !run.is_terminal() {
            return;
        }

        let mut totals = self.totals.write().unwrap_or_else(PoisonError::into_inner);
        match run.status() {
            RunStatus::Completed => {
                totals.completed += 1;
                let ai_ms = run.ai_latency_ms();
                totals.ai.record(ai_ms);
                if ai_ms > self.budget_ms as f64 {
                    totals.overruns += 1;
                }
            }
            RunStatus::Rejected => totals.rejected += 1,
            _ => totals.failed += 1,
        }

        for record in run.stages() {
            totals
                .stages
                .entry(record.stage)
                .or_default()
                .record(record.latency_ms);

            let is_safety = matches!(
                record.stage,
                StageName::InitialSafety | StageName::PostReviewSafety
            );
            if is_safety && record.passed == Some(false) {
                totals.safety_issues += 1;
            }
            if record.stage == StageName::Rewrite {
                totals.tone_resolved += 1;
            }
        }

        if run.review().is_some_and(|r| r.edited) {
            totals.edited += 1;
        }

        debug!(run_id = %run.id, status = %run.status(), "Run folded into metrics");
    }

    pub fn summary(&self) -> RunSummary {
        let totals = self.totals.read().unwrap_or_else(PoisonError::into_inner);
        let total = totals.completed + totals.rejected + totals.failed;
        let success_rate = if total == 0 {
            0.0
        } else {
            totals.completed as f64 / total as f64 * 100.0
        };

        RunSummary {
            total,
            completed: totals.completed,
            rejected: totals.rejected,
            failed: totals.failed,
            success_rate,
            ai_latency: totals.ai.stats(),
            safety_issues_detected: totals.safety_issues,
            tone_issues_resolved: totals.tone_resolved,
            edited_by_reviewer: totals.edited,
            budget_overruns: totals.overruns,
            budget_ms: self.budget_ms,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let summary = self.summary();
        let totals = self.totals.read().unwrap_or_else(PoisonError::into_inner);

        let human_review = totals
            .stages
            .get(&StageName::HumanReview)
            .map(LatencyTracker::stats)
            .unwrap_or_default();
        let stages = totals
            .stages
            .iter()
            .filter(|(stage, _)| stage.is_model_call())
            .map(|(stage, tracker)| (*stage, tracker.stats()))
            .collect();

        MetricsSnapshot {
            summary,
            stages,
            human_review,
        }
    }

    pub fn reset(&self) {
        *self.totals.write().unwrap_or_else(PoisonError::into_inner) = Totals::default();
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replyline_core::customer::CustomerMessage;
    use replyline_core::run::{ReviewRecord, StageRecord};

    fn completed(ai_ms: f64, rewrite: bool, edited: bool) -> PipelineRun {
        let mut run = PipelineRun::new(CustomerMessage::new("where is my order"));
        let share = ai_ms / if rewrite { 5.0 } else { 4.0 };
        run.record(StageRecord::new(StageName::InitialSafety, "", "safe", share).with_passed(true))
            .unwrap();
        run.record(StageRecord::new(StageName::Generation, "", "draft", share))
            .unwrap();
        run.await_review().unwrap();
        run.record(StageRecord::new(StageName::HumanReview, "draft", "draft", 4000.0))
            .unwrap();
        run.attach_review(ReviewRecord {
            original: "draft".into(),
            approved: "draft".into(),
            edited,
            notes: None,
            review_ms: 4000.0,
        });
        run.resume().unwrap();
        run.record(
            StageRecord::new(StageName::PostReviewSafety, "", "safe", share).with_passed(true),
        )
        .unwrap();
        run.record(StageRecord::new(StageName::ToneCheck, "", "tone", share).with_passed(!rewrite))
            .unwrap();
        if rewrite {
            run.record(StageRecord::new(StageName::Rewrite, "", "better", share))
                .unwrap();
        }
        run.complete("final").unwrap();
        run
    }

    fn unsafe_input() -> PipelineRun {
        let mut run = PipelineRun::new(CustomerMessage::new("abuse"));
        run.record(
            StageRecord::new(StageName::InitialSafety, "abuse", "unsafe", 30.0).with_passed(false),
        )
        .unwrap();
        run.reject("Unsafe content").unwrap();
        run
    }

    #[test]
    fn empty_recorder() {
        let summary = MetricsRecorder::default().summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
    }

    #[test]
    fn counts_outcomes_and_issues() {
        let metrics = MetricsRecorder::new(200);
        metrics.observe(&completed(120.0, false, false));
        metrics.observe(&completed(300.0, true, true));
        metrics.observe(&unsafe_input());

        let mut failed = PipelineRun::new(CustomerMessage::new("hi"));
        failed.fail("Transport error").unwrap();
        metrics.observe(&failed);

        let s = metrics.summary();
        assert_eq!(s.total, 4);
        assert_eq!((s.completed, s.rejected, s.failed), (2, 1, 1));
        assert_eq!(s.success_rate, 50.0);
        assert_eq!(s.safety_issues_detected, 1);
        assert_eq!(s.tone_issues_resolved, 1);
        assert_eq!(s.edited_by_reviewer, 1);
        assert_eq!(s.budget_overruns, 1);
        assert_eq!(s.ai_latency.count, 2);
        assert!((s.ai_latency.max_ms - 300.0).abs() < 1e-9);
    }

    #[test]
    fn in_flight_runs_are_ignored() {
        let metrics = MetricsRecorder::default();
        metrics.observe(&PipelineRun::new(CustomerMessage::new("hi")));
        assert_eq!(metrics.summary().total, 0);
    }

    #[test]
    fn snapshot_splits_model_stages_from_review() {
        let metrics = MetricsRecorder::default();
        metrics.observe(&completed(100.0, false, false));

        let snap = metrics.snapshot();
        assert!(!snap.stages.contains_key(&StageName::HumanReview));
        assert_eq!(snap.stages[&StageName::Generation].count, 1);
        assert_eq!(snap.human_review.count, 1);

        let json = serde_json::to_value(&snap).unwrap();
        assert!(json["stages"]["tone_check"]["p95_ms"].is_number());

        metrics.reset();
        assert_eq!(metrics.summary().total, 0);
    }
}
