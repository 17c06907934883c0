//! Association learning between primary requests and their leaf resources.
//!
//! The transport reports every request with [`AssetCache::record_request_path`].
//! The first request seen on a session opens a tracking window; leaf
//! requests on that session during the warm-up period are collected into
//! it. When the warm-up elapses the window is scored against earlier
//! windows for the same primary path, and a consistent association is
//! promoted so the planner can push it.
//!
//! # Components
//!
//! - [`AssetCache`] - promotion/demotion state machine
//! - [`RelatedPaths`] - ordered set with set-equality semantics
//! - [`SessionRegistry`] / [`SessionId`] - explicit connection handles
//! - [`WarmupScheduler`] - timer seam ([`TokioScheduler`], [`ManualScheduler`])

mod cache;
mod paths;
mod scheduler;
mod session;

pub use cache::{AssetCache, LearningStats, WarmingMetrics};
pub use paths::RelatedPaths;
pub use scheduler::{ManualScheduler, TokioScheduler, WarmupScheduler, WarmupTask};
pub use session::{SessionId, SessionRegistry};
