use serde::Serialize;

/// Summary of one latency series, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: Vec<f64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, latency_ms: f64) {
        if latency_ms.is_finite() {
            self.samples.push(latency_ms.max(0.0));
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// All zeros when no samples were recorded.
    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        let sum: f64 = sorted.iter().sum();

        LatencyStats {
            count: sorted.len(),
            avg_ms: sum / sorted.len() as f64,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            p95_ms: percentile(&sorted, 95.0),
        }
    }
}

/// Linear-interpolated percentile over sorted samples.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let weight = rank - lower as f64;
    sorted[lower] + weight * (sorted[upper] - sorted[lower])
}
