//! Budget-bounded push planning.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::size::SizeLookup;
use crate::client_state::ClientCacheChecker;
use crate::learning::RelatedPaths;
use crate::telemetry::PushMetrics;

/// One asset selected for pushing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAsset {
    pub path: String,
    pub size: u64,
}

/// Ordered assets to push alongside one primary response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushPlan {
    /// The request the plan was built for.
    pub primary: String,
    /// Selected assets in push order.
    pub assets: Vec<PlannedAsset>,
    /// Sum of selected asset sizes.
    pub total_bytes: u64,
    /// Budget the plan was built against.
    pub budget: u64,
}

impl PushPlan {
    /// An empty plan for `primary`.
    pub fn empty(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ..Default::default()
        }
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Number of selected assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Selected paths in push order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.path.as_str())
    }

    /// Budget left after the selected assets.
    pub fn remaining_budget(&self) -> u64 {
        self.budget.saturating_sub(self.total_bytes)
    }
}

/// Turns a learned asset set into a push plan.
///
/// Candidates are scanned in learned order. A candidate is skipped when the
/// client may already hold it, when its size cannot be determined, or when
/// it would overflow the budget; scanning continues after an over-budget
/// candidate since a later, smaller one may still fit. Every selected asset
/// is recorded in the client checker before the plan is returned.
#[derive(Debug, Clone, Default)]
pub struct PushPlanner {
    metrics: Arc<PushMetrics>,
}

impl PushPlanner {
    /// Create a planner with its own counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner that reports into shared counters.
    pub fn with_metrics(metrics: Arc<PushMetrics>) -> Self {
        Self { metrics }
    }

    /// Build a plan for `primary` from `related` within `budget` bytes.
    ///
    /// The primary path itself is not added to `checker`.
    pub async fn plan(
        &self,
        primary: &str,
        related: &RelatedPaths,
        checker: &mut ClientCacheChecker,
        budget: u64,
        sizes: &dyn SizeLookup,
    ) -> PushPlan {
        let mut plan = PushPlan {
            primary: primary.to_string(),
            budget,
            ..Default::default()
        };

        for candidate in related {
            if checker.may_have_path(candidate) {
                self.metrics.skipped_cached();
                continue;
            }

            let size = match sizes.size_of(candidate).await {
                Ok(size) => size,
                Err(e) => {
                    self.metrics.skipped_lookup_failed();
                    debug!(primary, candidate, error = %e, "Size lookup failed, skipping");
                    continue;
                }
            };

            if plan.total_bytes.saturating_add(size) > budget {
                self.metrics.skipped_over_budget();
                debug!(
                    primary,
                    candidate,
                    size,
                    remaining = plan.remaining_budget(),
                    "Over budget, skipping"
                );
                continue;
            }

            checker.add_path(candidate);
            plan.total_bytes += size;
            plan.assets.push(PlannedAsset {
                path: candidate.to_string(),
                size,
            });
            self.metrics.asset_planned(size);
        }

        self.metrics.plan_built();
        debug!(
            primary,
            assets = plan.len(),
            bytes = plan.total_bytes,
            budget,
            "Built push plan"
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::FixedSizeLookup;
    use proptest::prelude::*;

    fn related(paths: &[&str]) -> RelatedPaths {
        paths.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_plans_in_learned_order() {
        let sizes = FixedSizeLookup::new()
            .with("/c.js", 10)
            .with("/a.css", 20)
            .with("/b.png", 30);
        let mut checker = ClientCacheChecker::new();

        let plan = PushPlanner::new()
            .plan("/", &related(&["/c.js", "/a.css", "/b.png"]), &mut checker, 1000, &sizes)
            .await;

        assert_eq!(plan.paths().collect::<Vec<_>>(), vec!["/c.js", "/a.css", "/b.png"]);
        assert_eq!(plan.total_bytes, 60);
        assert_eq!(plan.remaining_budget(), 940);
    }

    #[tokio::test]
    async fn test_skips_assets_client_has() {
        let sizes = FixedSizeLookup::new().with("/a.js", 10).with("/b.js", 10);
        let mut checker = ClientCacheChecker::new();
        checker.add_path("/a.js");

        let plan = PushPlanner::new()
            .plan("/", &related(&["/a.js", "/b.js"]), &mut checker, 1000, &sizes)
            .await;

        assert_eq!(plan.paths().collect::<Vec<_>>(), vec!["/b.js"]);
    }

    #[tokio::test]
    async fn test_over_budget_candidate_does_not_stop_scan() {
        let sizes = FixedSizeLookup::new()
            .with("/small.css", 40)
            .with("/huge.png", 500)
            .with("/tiny.js", 50);
        let mut checker = ClientCacheChecker::new();
        let metrics = Arc::new(PushMetrics::new());

        let plan = PushPlanner::with_metrics(metrics.clone())
            .plan(
                "/",
                &related(&["/small.css", "/huge.png", "/tiny.js"]),
                &mut checker,
                100,
                &sizes,
            )
            .await;

        assert_eq!(plan.paths().collect::<Vec<_>>(), vec!["/small.css", "/tiny.js"]);
        assert_eq!(plan.total_bytes, 90);
        assert!(!checker.may_have_path("/huge.png"));
        assert_eq!(metrics.snapshot().skipped_over_budget, 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_only_that_candidate() {
        let sizes = FixedSizeLookup::new().with("/ok.js", 5);
        let mut checker = ClientCacheChecker::new();

        let plan = PushPlanner::new()
            .plan("/", &related(&["/gone.js", "/ok.js"]), &mut checker, 100, &sizes)
            .await;

        assert_eq!(plan.paths().collect::<Vec<_>>(), vec!["/ok.js"]);
        assert!(!checker.may_have_path("/gone.js"));
    }

    #[tokio::test]
    async fn test_selected_assets_are_added_to_checker() {
        let sizes = FixedSizeLookup::new().with("/a.js", 1).with("/b.js", 1);
        let mut checker = ClientCacheChecker::new();

        PushPlanner::new()
            .plan("/index.html", &related(&["/a.js", "/b.js"]), &mut checker, 10, &sizes)
            .await;

        assert!(checker.may_have_path("/a.js"));
        assert!(checker.may_have_path("/b.js"));
        // The caller adds the primary.
        assert!(!checker.may_have_path("/index.html"));
    }

    #[tokio::test]
    async fn test_exact_fit_is_allowed() {
        let sizes = FixedSizeLookup::new().with("/a.js", 60).with("/b.js", 40);
        let mut checker = ClientCacheChecker::new();

        let plan = PushPlanner::new()
            .plan("/", &related(&["/a.js", "/b.js"]), &mut checker, 100, &sizes)
            .await;

        assert_eq!(plan.total_bytes, 100);
        assert_eq!(plan.remaining_budget(), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_yields_empty_plan() {
        let sizes = FixedSizeLookup::new().with("/a.js", 1);
        let mut checker = ClientCacheChecker::new();

        let plan = PushPlanner::new()
            .plan("/", &related(&["/a.js"]), &mut checker, 0, &sizes)
            .await;

        assert!(plan.is_empty());
        assert_eq!(plan, PushPlan { budget: 0, ..PushPlan::empty("/") });
    }

    proptest! {
        #[test]
        fn prop_plan_never_exceeds_budget(
            sizes in prop::collection::vec(0u64..500, 0..20),
            budget in 0u64..2000,
        ) {
            let mut lookup = FixedSizeLookup::new();
            let mut candidates = RelatedPaths::new();
            for (i, size) in sizes.iter().enumerate() {
                let path = format!("/asset-{}", i);
                lookup.insert(path.clone(), *size);
                candidates.insert(path);
            }
            let mut checker = ClientCacheChecker::new();

            let plan = futures::executor::block_on(
                PushPlanner::new().plan("/", &candidates, &mut checker, budget, &lookup),
            );

            prop_assert!(plan.total_bytes <= budget);
            prop_assert_eq!(plan.total_bytes, plan.assets.iter().map(|a| a.size).sum::<u64>());
            for asset in &plan.assets {
                prop_assert!(asset.size <= budget);
                prop_assert!(checker.may_have_path(&asset.path));
            }
        }
    }
}
