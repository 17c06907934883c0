//! Push telemetry for observability.
//!
//! Lock-free atomic counters updated by the learning cache, the planner and
//! push execution, plus a point-in-time copy for reporting.
//!
//! # Architecture
//!
//! ```text
//! AssetCache / PushPlanner / PushTask ───► PushMetrics ───► MetricsSnapshot ───► Views
//!                                         (atomic counters)  (point-in-time copy)  (CLI, logs)
//! ```
//!
//! # Example
//!
//! ```
//! use autopush::telemetry::PushMetrics;
//!
//! let metrics = PushMetrics::new();
//! metrics.request_recorded();
//! metrics.asset_planned(2048);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.requests_recorded, 1);
//! assert_eq!(snapshot.bytes_planned, 2048);
//! ```

mod metrics;
mod snapshot;

pub use metrics::PushMetrics;
pub use snapshot::MetricsSnapshot;
