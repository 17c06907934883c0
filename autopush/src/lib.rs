//! AutoPush - learned HTTP/2 server push
//!
//! Watches which static resources clients fetch right after a page, learns
//! the associations that hold consistently, and pushes those resources
//! alongside later requests for the page. A compact probabilistic token
//! round-trips through the client so assets it already holds are not pushed
//! again.
//!
//! # Modules
//!
//! - [`learning`] - per-path association learning with warm-up windows
//! - [`client_state`] - Bloom filter client cache checker and its token
//! - [`planner`] - budget-bounded push plans
//! - [`push`] - the [`AutoPush`] facade and the transport seam
//! - [`config`] - defaults, validation and INI loading
//! - [`telemetry`] - counters and snapshots
//! - [`logging`] - tracing subscriber setup

pub mod client_state;
pub mod config;
pub mod learning;
pub mod logging;
pub mod planner;
pub mod push;
pub mod telemetry;

pub use client_state::ClientCacheChecker;
pub use config::{AssetCacheConfig, AutoPushConfig, ConfigError};
pub use learning::{AssetCache, SessionId};
pub use planner::{PushPlan, PushPlanner};
pub use push::{AutoPush, AutoPushError, PushTransport};
