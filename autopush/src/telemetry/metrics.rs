//! Atomic push counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::snapshot::MetricsSnapshot;

/// Counters shared by every component of one [`AutoPush`](crate::push::AutoPush).
///
/// All updates use relaxed ordering; counters are independent and only read
/// for reporting.
#[derive(Debug, Default)]
pub struct PushMetrics {
    requests_recorded: AtomicU64,
    windows_opened: AtomicU64,
    windows_orphaned: AtomicU64,
    promotions: AtomicU64,
    demotions: AtomicU64,
    plans: AtomicU64,
    assets_planned: AtomicU64,
    bytes_planned: AtomicU64,
    skipped_cached: AtomicU64,
    skipped_over_budget: AtomicU64,
    skipped_lookup_failed: AtomicU64,
    pushes_succeeded: AtomicU64,
    pushes_failed: AtomicU64,
}

impl PushMetrics {
    /// Create a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_recorded(&self) {
        self.requests_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn window_opened(&self) {
        self.windows_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// A warm-up timer fired after its tracking window was gone.
    pub fn window_orphaned(&self) {
        self.windows_orphaned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn promoted(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn demoted(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn plan_built(&self) {
        self.plans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asset_planned(&self, bytes: u64) {
        self.assets_planned.fetch_add(1, Ordering::Relaxed);
        self.bytes_planned.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn skipped_cached(&self) {
        self.skipped_cached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_over_budget(&self) {
        self.skipped_over_budget.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_lookup_failed(&self) {
        self.skipped_lookup_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn push_succeeded(&self) {
        self.pushes_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn push_failed(&self) {
        self.pushes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_recorded: self.requests_recorded.load(Ordering::Relaxed),
            windows_opened: self.windows_opened.load(Ordering::Relaxed),
            windows_orphaned: self.windows_orphaned.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            plans: self.plans.load(Ordering::Relaxed),
            assets_planned: self.assets_planned.load(Ordering::Relaxed),
            bytes_planned: self.bytes_planned.load(Ordering::Relaxed),
            skipped_cached: self.skipped_cached.load(Ordering::Relaxed),
            skipped_over_budget: self.skipped_over_budget.load(Ordering::Relaxed),
            skipped_lookup_failed: self.skipped_lookup_failed.load(Ordering::Relaxed),
            pushes_succeeded: self.pushes_succeeded.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
        }
    }
}
