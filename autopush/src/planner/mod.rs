//! Push planning.
//!
//! Given the learned asset set for a request, the client's cache state and
//! the transport's flow-control budget, [`PushPlanner`] selects which assets
//! to push and in what order.

mod plan;
mod size;

pub use plan::{PlannedAsset, PushPlan, PushPlanner};
pub use size::{BoxFuture, FixedSizeLookup, FsSizeLookup, SizeLookup, SizeLookupError};
