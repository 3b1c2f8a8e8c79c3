//! Latency statistics and run metrics for Replyline.
//!
//! [`LatencyTracker`] keeps raw samples for one series and summarizes them;
//! [`MetricsRecorder`] folds finished runs into per-stage trackers and run
//! counters and serves a [`MetricsSnapshot`] for the review server and CLI.

pub mod latency;
pub mod metrics;

pub use latency::{LatencyStats, LatencyTracker};
pub use metrics::{MetricsRecorder, MetricsSnapshot, RunSummary};
