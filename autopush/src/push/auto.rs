//! Request-level push orchestration.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::transport::{PushError, PushTransport};
use crate::client_state::ClientCacheChecker;
use crate::config::{AutoPushConfig, ConfigError};
use crate::learning::{AssetCache, SessionId, SessionRegistry, TokioScheduler, WarmupScheduler};
use crate::planner::{PushPlan, PushPlanner, SizeLookup};
use crate::telemetry::PushMetrics;

/// Errors constructing an [`AutoPush`].
#[derive(Debug, Error)]
pub enum AutoPushError {
    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No tokio runtime to run warm-up timers on.
    #[error("AutoPush::new must be called inside a tokio runtime")]
    NoRuntime,
}

/// Output of [`AutoPush::preprocess`].
#[derive(Debug)]
pub struct PreprocessResult {
    /// Client cache token to hand back to the client. Covers the primary
    /// path and every planned asset.
    pub outgoing_token: String,
    /// Deferred transfers, to run once the primary response has started.
    pub push: PushTask,
}

/// Pushes the assets of one plan.
#[derive(Debug)]
pub struct PushTask {
    plan: PushPlan,
    metrics: Arc<PushMetrics>,
}

/// Outcome of a [`PushTask`].
#[derive(Debug, Default)]
pub struct PushReport {
    /// Paths pushed successfully.
    pub pushed: Vec<String>,
    /// Paths that failed, with the reason.
    pub failed: Vec<(String, PushError)>,
}

impl PushReport {
    /// Whether every planned push succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl PushTask {
    /// The plan this task will execute.
    pub fn plan(&self) -> &PushPlan {
        &self.plan
    }

    /// Push every planned asset concurrently.
    ///
    /// A failed push is logged and reported; it does not stop the others.
    pub async fn run(self, transport: &dyn PushTransport) -> PushReport {
        let transfers = self.plan.assets.iter().map(|asset| async move {
            let result = transport.push(&asset.path).await;
            (asset.path.clone(), result)
        });
        let results = futures::future::join_all(transfers).await;

        let mut report = PushReport::default();
        for (path, result) in results {
            match result {
                Ok(()) => {
                    self.metrics.push_succeeded();
                    report.pushed.push(path);
                }
                Err(e) => {
                    self.metrics.push_failed();
                    warn!(primary = %self.plan.primary, path = %path, error = %e, "Push failed");
                    report.failed.push((path, e));
                }
            }
        }
        report
    }
}

/// Learned server push for one server.
///
/// Wires the learning cache, client cache tokens and the planner together.
///
/// # Example
///
/// ```
/// use autopush::config::AutoPushConfig;
/// use autopush::learning::ManualScheduler;
/// use autopush::planner::FixedSizeLookup;
/// use autopush::push::{AutoPush, MemoryTransport};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let scheduler = Arc::new(ManualScheduler::new());
/// let sizes = Arc::new(FixedSizeLookup::new().with("/app.js", 1200));
/// let autopush = AutoPush::with_scheduler(AutoPushConfig::default(), sizes, scheduler.clone())
///     .unwrap();
///
/// let session = autopush.open_session();
/// autopush.record_request_path(session, "/", false);
/// autopush.record_request_path(session, "/app.js", true);
/// scheduler.advance(autopush.config().learning.warmup_duration);
///
/// let transport = MemoryTransport::new(Some(65_535));
/// let result = autopush.preprocess("/", None, &transport).await;
/// let report = result.push.run(&transport).await;
/// assert_eq!(report.pushed, vec!["/app.js".to_string()]);
/// # });
/// ```
pub struct AutoPush {
    config: AutoPushConfig,
    cache: AssetCache,
    planner: PushPlanner,
    sizes: Arc<dyn SizeLookup>,
    sessions: SessionRegistry,
    metrics: Arc<PushMetrics>,
}

impl std::fmt::Debug for AutoPush {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoPush")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("open_sessions", &self.sessions.open_count())
            .finish_non_exhaustive()
    }
}

impl AutoPush {
    /// Build on the current tokio runtime.
    pub fn new(config: AutoPushConfig, sizes: Arc<dyn SizeLookup>) -> Result<Self, AutoPushError> {
        let scheduler = TokioScheduler::current().ok_or(AutoPushError::NoRuntime)?;
        Ok(Self::with_scheduler(config, sizes, Arc::new(scheduler))?)
    }

    /// Build with an explicit warm-up scheduler.
    pub fn with_scheduler(
        config: AutoPushConfig,
        sizes: Arc<dyn SizeLookup>,
        scheduler: Arc<dyn WarmupScheduler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = Arc::new(PushMetrics::new());
        let cache = AssetCache::with_metrics(config.learning.clone(), scheduler, metrics.clone())?;
        Ok(Self {
            config,
            cache,
            planner: PushPlanner::with_metrics(metrics.clone()),
            sizes,
            sessions: SessionRegistry::new(),
            metrics,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &AutoPushConfig {
        &self.config
    }

    /// The learning cache.
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Shared counters.
    pub fn metrics(&self) -> &Arc<PushMetrics> {
        &self.metrics
    }

    /// Register a new connection.
    pub fn open_session(&self) -> SessionId {
        self.sessions.open()
    }

    /// Report a connection closed. Drops any tracking window it had open.
    pub fn close_session(&self, session: SessionId) {
        self.sessions.close(session);
        self.cache.close_session(session);
    }

    /// Report a request. Call once the path is known to resolve to a
    /// servable resource; `is_leaf` marks static assets eligible for push.
    ///
    /// Requests on ids this instance did not open, or has seen closed, are
    /// ignored.
    pub fn record_request_path(&self, session: SessionId, path: &str, is_leaf: bool) {
        if !self.sessions.is_open(session) {
            debug!(%session, path, "Ignoring request on unknown or closed session");
            return;
        }
        self.cache.record_request_path(session, path, is_leaf);
    }

    /// Plan pushes for `primary` before its response is sent.
    ///
    /// `incoming_token` is the client cache token the client sent, if any;
    /// undecodable tokens are treated as absent. The outgoing token must be
    /// returned to the client with the primary response so later requests
    /// skip what this one pushes.
    pub async fn preprocess(
        &self,
        primary: &str,
        incoming_token: Option<&str>,
        transport: &dyn PushTransport,
    ) -> PreprocessResult {
        let capacity = self.config.client_state.capacity;
        let mut checker = match incoming_token {
            Some(token) => ClientCacheChecker::deserialize_or_fresh(token, capacity),
            None => ClientCacheChecker::with_capacity(capacity),
        };

        let plan = match self.push_budget(transport) {
            Some(budget) => {
                let related = self.cache.get_assets_for_path(primary);
                self.planner
                    .plan(primary, &related, &mut checker, budget, self.sizes.as_ref())
                    .await
            }
            None => {
                debug!(primary, "Push unavailable on this stream");
                PushPlan::empty(primary)
            }
        };

        checker.add_path(primary);
        PreprocessResult {
            outgoing_token: checker.serialize(),
            push: PushTask {
                plan,
                metrics: self.metrics.clone(),
            },
        }
    }

    fn push_budget(&self, transport: &dyn PushTransport) -> Option<u64> {
        if !transport.push_allowed() {
            return None;
        }
        // The primary response shares this window; it is not subtracted.
        transport.remaining_window().filter(|&window| window > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::ManualScheduler;
    use crate::planner::FixedSizeLookup;
    use crate::push::MemoryTransport;
    use std::time::Duration;

    fn build(sizes: FixedSizeLookup) -> (AutoPush, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let autopush =
            AutoPush::with_scheduler(AutoPushConfig::default(), Arc::new(sizes), scheduler.clone())
                .unwrap();
        (autopush, scheduler)
    }

    fn learn(autopush: &AutoPush, scheduler: &ManualScheduler, primary: &str, leaves: &[&str]) {
        let session = autopush.open_session();
        autopush.record_request_path(session, primary, false);
        for leaf in leaves {
            autopush.record_request_path(session, leaf, true);
        }
        scheduler.advance(Duration::from_secs(1));
        autopush.close_session(session);
    }

    #[tokio::test]
    async fn test_preprocess_plans_and_updates_token() {
        let (autopush, scheduler) = build(
            FixedSizeLookup::new()
                .with("/bar.js", 100)
                .with("/bar.png", 200),
        );
        learn(&autopush, &scheduler, "/bar.html", &["/bar.js", "/bar.png"]);

        let transport = MemoryTransport::new(Some(65_535));
        let result = autopush.preprocess("/bar.html", None, &transport).await;
        assert_eq!(
            result.push.plan().paths().collect::<Vec<_>>(),
            vec!["/bar.js", "/bar.png"]
        );

        let token = ClientCacheChecker::deserialize(&result.outgoing_token);
        assert!(token.may_have_path("/bar.html"));
        assert!(token.may_have_path("/bar.js"));
        assert!(token.may_have_path("/bar.png"));

        let report = result.push.run(&transport).await;
        assert!(report.is_complete());
        assert_eq!(report.pushed.len(), 2);
    }

    #[tokio::test]
    async fn test_returning_client_gets_nothing_twice() {
        let (autopush, scheduler) = build(FixedSizeLookup::new().with("/app.js", 10));
        learn(&autopush, &scheduler, "/", &["/app.js"]);
        let transport = MemoryTransport::new(Some(65_535));

        let first = autopush.preprocess("/", None, &transport).await;
        assert_eq!(first.push.plan().len(), 1);

        let second = autopush
            .preprocess("/", Some(&first.outgoing_token), &transport)
            .await;
        assert!(second.push.plan().is_empty());
    }

    #[tokio::test]
    async fn test_no_push_without_window() {
        let (autopush, scheduler) = build(FixedSizeLookup::new().with("/app.js", 10));
        learn(&autopush, &scheduler, "/", &["/app.js"]);

        for transport in [
            MemoryTransport::push_disabled(),
            MemoryTransport::new(None),
            MemoryTransport::new(Some(0)),
        ] {
            let result = autopush.preprocess("/", None, &transport).await;
            assert!(result.push.plan().is_empty());
            // The primary is still recorded.
            let token = ClientCacheChecker::deserialize(&result.outgoing_token);
            assert!(token.may_have_path("/"));
        }
    }

    #[tokio::test]
    async fn test_bad_token_is_treated_as_absent() {
        let (autopush, scheduler) = build(FixedSizeLookup::new().with("/app.js", 10));
        learn(&autopush, &scheduler, "/", &["/app.js"]);
        let transport = MemoryTransport::new(Some(1000));

        let result = autopush
            .preprocess("/", Some("definitely not base64"), &transport)
            .await;
        assert_eq!(result.push.plan().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_does_not_stop_others() {
        let (autopush, scheduler) = build(
            FixedSizeLookup::new()
                .with("/a.js", 10)
                .with("/b.js", 10),
        );
        learn(&autopush, &scheduler, "/", &["/a.js", "/b.js"]);
        let transport = MemoryTransport::new(Some(1000)).failing_on("/a.js");

        let result = autopush.preprocess("/", None, &transport).await;
        // Attempted assets are in the token even if the transfer fails.
        let token = ClientCacheChecker::deserialize(&result.outgoing_token);
        assert!(token.may_have_path("/a.js"));

        let report = result.push.run(&transport).await;
        assert_eq!(report.pushed, vec!["/b.js".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "/a.js");

        let snapshot = autopush.metrics().snapshot();
        assert_eq!(snapshot.pushes_succeeded, 1);
        assert_eq!(snapshot.pushes_failed, 1);
    }

    #[test]
    fn test_closed_session_requests_are_ignored() {
        let (autopush, scheduler) = build(FixedSizeLookup::new());
        let session = autopush.open_session();
        autopush.close_session(session);

        autopush.record_request_path(session, "/", false);
        autopush.record_request_path(session, "/app.js", true);
        autopush.record_request_path(SessionId::from_raw(9_999), "/other", false);
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(autopush.cache().stats().open_windows, 0);
        assert!(!autopush.cache().is_learned("/"));
        assert!(!autopush.cache().is_learned("/other"));
        assert_eq!(autopush.metrics().snapshot().windows_opened, 0);
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = AutoPush::new(AutoPushConfig::default(), Arc::new(FixedSizeLookup::new()))
            .unwrap_err();
        assert!(matches!(err, AutoPushError::NoRuntime));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = AutoPushConfig::default();
        config.learning.minimum_requests = 0;
        let err = AutoPush::new(config, Arc::new(FixedSizeLookup::new())).unwrap_err();
        assert!(matches!(err, AutoPushError::Config(_)));
    }
}
