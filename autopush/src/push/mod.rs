//! Push orchestration.
//!
//! [`AutoPush`] is the entry point a server embeds. For each primary request
//! it decodes the client's cache token, plans pushes for the learned
//! association within the stream's flow-control window, and returns the
//! updated token together with a [`PushTask`] that performs the transfers
//! through a [`PushTransport`].

mod auto;
mod transport;

pub use auto::{AutoPush, AutoPushError, PreprocessResult, PushReport, PushTask};
pub use transport::{MemoryTransport, PushError, PushTransport};
