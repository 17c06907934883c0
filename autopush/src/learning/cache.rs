//! Learning cache: which leaf resources follow which primary request.
//!
//! # State Machine
//!
//! Per primary path:
//!
//! ```text
//! unseen --[first request on a session]--> tracking
//! tracking --[warm-up elapsed]--> evaluated
//! evaluated --[total < minimum]--> tracking (next window)
//! evaluated --[ratio <= demotion]--> tracking (restart from this window)
//! evaluated --[ratio >= promotion]--> promoted (terminal)
//! evaluated --[path is a push candidate]--> discarded
//! ```
//!
//! A window opens the first time a session is seen with no window open.
//! Leaf requests on that session are collected until the warm-up timer
//! fires. The collected set then counts as a success if it exactly equals
//! the set stored for the primary path so far.
//!
//! # Thread Safety
//!
//! All learning state sits behind one `Mutex`. Each evaluation is a single
//! critical section, so two evaluations never interleave. Timers hold a
//! `Weak` reference and do nothing once the cache is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::paths::RelatedPaths;
use super::scheduler::WarmupScheduler;
use super::session::SessionId;
use crate::config::{AssetCacheConfig, ConfigError};
use crate::telemetry::PushMetrics;

/// Trial record for a primary path that is not yet trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmingMetrics {
    /// Windows whose observed set matched `paths` exactly.
    pub successes: u32,
    /// Windows evaluated since the trial (re)started.
    pub total: u32,
    /// Reference set that later windows are compared against.
    pub paths: RelatedPaths,
}

impl WarmingMetrics {
    fn new(paths: RelatedPaths) -> Self {
        Self {
            successes: 0,
            total: 0,
            paths,
        }
    }

    /// Trial restarted from the latest window.
    fn restarted(paths: RelatedPaths) -> Self {
        Self {
            successes: 1,
            total: 1,
            paths,
        }
    }

    fn ratio(&self) -> f64 {
        f64::from(self.successes) / f64::from(self.total)
    }
}

/// Result of one warm-up evaluation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Evaluation {
    /// Primary path was promoted by an earlier window.
    AlreadyLearned,
    /// Primary path is itself pushed for another primary.
    PushCandidate,
    /// No tracking window for the session (closed, or already consumed).
    WindowMissing,
    /// Not enough windows yet.
    Accumulating { successes: u32, total: u32 },
    /// Ratio between the thresholds; keep collecting.
    Undecided { ratio: f64 },
    /// Association is now trusted.
    Promoted { assets: usize, ratio: f64 },
    /// Trial restarted from this window.
    Demoted { ratio: f64 },
}

/// Counts describing what the cache currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LearningStats {
    /// Primary paths with a promoted association.
    pub learned_paths: usize,
    /// Paths that appear in some promoted association.
    pub push_candidates: usize,
    /// Primary paths still on trial.
    pub warming_paths: usize,
    /// Sessions with a tracking window open.
    pub open_windows: usize,
}

/// Leaf paths collected on one session since its primary request.
#[derive(Debug)]
struct TrackingWindow {
    /// Ties the window to the timer scheduled when it opened.
    generation: u64,
    paths: RelatedPaths,
}

#[derive(Debug, Default)]
struct LearningState {
    /// Open tracking window per session.
    windows: HashMap<SessionId, TrackingWindow>,
    warming: HashMap<String, WarmingMetrics>,
    assets: HashMap<String, RelatedPaths>,
    push_candidates: HashSet<String>,
    next_generation: u64,
}

impl LearningState {
    /// Open a window for `session` unless one is open. Returns its generation.
    fn open_window(&mut self, session: SessionId) -> Option<u64> {
        if self.windows.contains_key(&session) {
            return None;
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.windows.insert(
            session,
            TrackingWindow {
                generation,
                paths: RelatedPaths::new(),
            },
        );
        Some(generation)
    }

    /// Remove the window opened under `generation`, if it is still open.
    fn take_window(&mut self, session: SessionId, generation: u64) -> Option<RelatedPaths> {
        match self.windows.get(&session) {
            Some(window) if window.generation == generation => {
                self.windows.remove(&session).map(|w| w.paths)
            }
            _ => None,
        }
    }

    fn evaluate(
        &mut self,
        path: &str,
        session: SessionId,
        generation: u64,
        config: &AssetCacheConfig,
    ) -> Evaluation {
        // The window is consumed whatever the outcome, so the session can
        // open a new one.
        let observed = self.take_window(session, generation);

        if self.assets.contains_key(path) {
            return Evaluation::AlreadyLearned;
        }
        // A path that is pushed for some other primary must not become a
        // primary itself, or pushes would chain.
        if self.push_candidates.contains(path) {
            return Evaluation::PushCandidate;
        }

        let Some(observed) = observed else {
            return Evaluation::WindowMissing;
        };

        let entry = self
            .warming
            .entry(path.to_string())
            .or_insert_with(|| WarmingMetrics::new(observed.clone()));
        if entry.paths == observed {
            entry.successes += 1;
        }
        entry.total += 1;

        if entry.total < config.minimum_requests {
            return Evaluation::Accumulating {
                successes: entry.successes,
                total: entry.total,
            };
        }

        let ratio = entry.ratio();
        if ratio >= config.promotion_ratio {
            if let Some(entry) = self.warming.remove(path) {
                let assets = entry.paths.len();
                self.push_candidates
                    .extend(entry.paths.iter().map(str::to_string));
                self.assets.insert(path.to_string(), entry.paths);
                return Evaluation::Promoted { assets, ratio };
            }
        } else if ratio <= config.demotion_ratio {
            self.warming
                .insert(path.to_string(), WarmingMetrics::restarted(observed));
            return Evaluation::Demoted { ratio };
        }
        Evaluation::Undecided { ratio }
    }
}

struct Shared {
    config: AssetCacheConfig,
    state: Mutex<LearningState>,
    scheduler: Arc<dyn WarmupScheduler>,
    metrics: Arc<PushMetrics>,
}

impl Shared {
    fn on_warm(&self, path: &str, session: SessionId, generation: u64) -> Evaluation {
        let evaluation = self
            .state
            .lock()
            .evaluate(path, session, generation, &self.config);

        match &evaluation {
            Evaluation::AlreadyLearned | Evaluation::PushCandidate => {
                debug!(path, %session, outcome = ?evaluation, "Skipping warm-up evaluation");
            }
            Evaluation::WindowMissing => {
                self.metrics.window_orphaned();
                warn!(path, %session, "Tracking window missing at warm-up, session closed?");
            }
            Evaluation::Accumulating { successes, total } => {
                debug!(path, successes, total, "Collecting more windows");
            }
            Evaluation::Undecided { ratio } => {
                debug!(path, ratio, "Association undecided");
            }
            Evaluation::Promoted { assets, ratio } => {
                self.metrics.promoted();
                info!(path, assets, ratio, "Promoted push association");
            }
            Evaluation::Demoted { ratio } => {
                self.metrics.demoted();
                debug!(path, ratio, "Demoted association, restarting trial");
            }
        }
        evaluation
    }
}

/// Learns, per primary path, the leaf resources requested right after it.
///
/// # Example
///
/// ```
/// use autopush::config::AssetCacheConfig;
/// use autopush::learning::{AssetCache, ManualScheduler, SessionId};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = Arc::new(ManualScheduler::new());
/// let config = AssetCacheConfig::new().with_warmup(Duration::from_millis(10));
/// let cache = AssetCache::new(config, scheduler.clone()).unwrap();
///
/// let session = SessionId::from_raw(1);
/// cache.record_request_path(session, "/index.html", false);
/// cache.record_request_path(session, "/app.js", true);
/// scheduler.advance(Duration::from_millis(10));
///
/// let assets = cache.get_assets_for_path("/index.html");
/// assert!(assets.contains("/app.js"));
/// ```
#[derive(Clone)]
pub struct AssetCache {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl AssetCache {
    /// Build a cache, rejecting invalid configuration.
    pub fn new(
        config: AssetCacheConfig,
        scheduler: Arc<dyn WarmupScheduler>,
    ) -> Result<Self, ConfigError> {
        Self::with_metrics(config, scheduler, Arc::new(PushMetrics::new()))
    }

    /// Build a cache that reports into shared counters.
    pub fn with_metrics(
        config: AssetCacheConfig,
        scheduler: Arc<dyn WarmupScheduler>,
        metrics: Arc<PushMetrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(LearningState::default()),
                scheduler,
                metrics,
            }),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &AssetCacheConfig {
        &self.shared.config
    }

    /// Counters this cache reports into.
    pub fn metrics(&self) -> &Arc<PushMetrics> {
        &self.shared.metrics
    }

    /// Record a request seen on `session`.
    ///
    /// Opens a tracking window if the session has none, and schedules its
    /// evaluation. Otherwise adds `path` to the open window when it is a
    /// leaf. Paths that already have a learned association are ignored.
    pub fn record_request_path(&self, session: SessionId, path: &str, is_leaf: bool) {
        self.shared.metrics.request_recorded();

        let opened = {
            let mut state = self.shared.state.lock();
            if state.assets.contains_key(path) {
                return;
            }
            let opened = state.open_window(session);
            if opened.is_none() && is_leaf {
                // Only leaf resources are pushed.
                if let Some(window) = state.windows.get_mut(&session) {
                    window.paths.insert(path);
                }
            }
            opened
        };

        if let Some(generation) = opened {
            self.shared.metrics.window_opened();
            debug!(path, %session, "Opened tracking window");
            let weak: Weak<Shared> = Arc::downgrade(&self.shared);
            let primary = path.to_string();
            self.shared.scheduler.schedule(
                self.shared.config.warmup_duration,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_warm(&primary, session, generation);
                    }
                }),
            );
        }
    }

    /// Drop the tracking window of a closed session.
    ///
    /// The pending timer still fires; it finds no window and does nothing.
    pub fn close_session(&self, session: SessionId) {
        if self.shared.state.lock().windows.remove(&session).is_some() {
            debug!(%session, "Discarded tracking window of closed session");
        }
    }

    /// The learned association for `path`, or an empty set.
    pub fn get_assets_for_path(&self, path: &str) -> RelatedPaths {
        self.shared
            .state
            .lock()
            .assets
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `path` has a learned association.
    pub fn is_learned(&self, path: &str) -> bool {
        self.shared.state.lock().assets.contains_key(path)
    }

    /// Whether `path` is pushed for some learned primary.
    pub fn is_push_candidate(&self, path: &str) -> bool {
        self.shared.state.lock().push_candidates.contains(path)
    }

    /// All learned associations, sorted by primary path.
    pub fn learned_paths(&self) -> Vec<(String, RelatedPaths)> {
        let state = self.shared.state.lock();
        let mut learned: Vec<_> = state
            .assets
            .iter()
            .map(|(path, assets)| (path.clone(), assets.clone()))
            .collect();
        learned.sort_by(|a, b| a.0.cmp(&b.0));
        learned
    }

    /// Current counts.
    pub fn stats(&self) -> LearningStats {
        let state = self.shared.state.lock();
        LearningStats {
            learned_paths: state.assets.len(),
            push_candidates: state.push_candidates.len(),
            warming_paths: state.warming.len(),
            open_windows: state.windows.len(),
        }
    }

    #[cfg(test)]
    fn warming_metrics(&self, path: &str) -> Option<WarmingMetrics> {
        self.shared.state.lock().warming.get(path).cloned()
    }

    #[cfg(test)]
    fn evaluate_now(&self, path: &str, session: SessionId, generation: u64) -> Evaluation {
        self.shared.on_warm(path, session, generation)
    }
}
