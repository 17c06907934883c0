//! Point-in-time copy of push counters.

use std::fmt;

use serde::Serialize;

/// Counter values captured by [`PushMetrics::snapshot`](super::PushMetrics::snapshot).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_recorded: u64,
    pub windows_opened: u64,
    pub windows_orphaned: u64,
    pub promotions: u64,
    pub demotions: u64,
    pub plans: u64,
    pub assets_planned: u64,
    pub bytes_planned: u64,
    pub skipped_cached: u64,
    pub skipped_over_budget: u64,
    pub skipped_lookup_failed: u64,
    pub pushes_succeeded: u64,
    pub pushes_failed: u64,
}

impl MetricsSnapshot {
    /// Fraction of attempted pushes that completed, or `None` before any push.
    pub fn push_success_rate(&self) -> Option<f64> {
        let attempted = self.pushes_succeeded + self.pushes_failed;
        if attempted == 0 {
            return None;
        }
        Some(self.pushes_succeeded as f64 / attempted as f64)
    }

    /// Candidates skipped for any reason.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_cached + self.skipped_over_budget + self.skipped_lookup_failed
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} promotions={} demotions={} plans={} planned={} ({} bytes) skipped={} pushed={} failed={}",
            self.requests_recorded,
            self.promotions,
            self.demotions,
            self.plans,
            self.assets_planned,
            self.bytes_planned,
            self.skipped_total(),
            self.pushes_succeeded,
            self.pushes_failed
        )
    }
}
