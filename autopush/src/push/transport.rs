//! Transport abstraction for server push.
//!
//! The push core never touches connections directly. The HTTP/2 server
//! implements [`PushTransport`] for the stream a request arrived on, telling
//! the core whether push is permitted, how much flow-control window is
//! available, and performing the actual transfer of each asset.
//!
//! # Implementors
//!
//! - Server integrations (outside this crate)
//! - [`MemoryTransport`] - Testing: records pushes, fails on demand

use std::collections::HashSet;

use parking_lot::Mutex;
use thiserror::Error;

use crate::planner::BoxFuture;

/// Errors pushing one asset.
#[derive(Debug, Error)]
pub enum PushError {
    /// Peer or transport refused the push stream.
    #[error("Push refused for {path}: {reason}")]
    Refused { path: String, reason: String },

    /// Transfer started but did not complete.
    #[error("Transfer of {path} failed: {reason}")]
    Transfer { path: String, reason: String },

    /// I/O error reading the asset.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The stream a primary request arrived on, as seen by the push core.
pub trait PushTransport: Send + Sync {
    /// Whether the peer currently accepts pushed streams.
    fn push_allowed(&self) -> bool;

    /// Bytes that may be sent without a window update, if known.
    fn remaining_window(&self) -> Option<u64>;

    /// Push one asset on a new stream and wait for it to finish.
    fn push<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), PushError>>;
}

/// In-memory transport that records what was pushed.
///
/// Useful for tests and dry runs.
#[derive(Debug)]
pub struct MemoryTransport {
    allowed: bool,
    window: Option<u64>,
    failing: HashSet<String>,
    pushed: Mutex<Vec<String>>,
}

impl MemoryTransport {
    /// A transport that allows push with the given window.
    pub fn new(window: Option<u64>) -> Self {
        Self {
            allowed: true,
            window,
            failing: HashSet::new(),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// A transport whose peer has disabled push.
    pub fn push_disabled() -> Self {
        Self {
            allowed: false,
            ..Self::new(None)
        }
    }

    /// Make pushes of `path` fail.
    pub fn failing_on(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Paths pushed successfully, in completion order.
    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().clone()
    }
}

impl PushTransport for MemoryTransport {
    fn push_allowed(&self) -> bool {
        self.allowed
    }

    fn remaining_window(&self) -> Option<u64> {
        self.window
    }

    fn push<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(async move {
            if self.failing.contains(path) {
                return Err(PushError::Transfer {
                    path: path.to_string(),
                    reason: "stream reset".to_string(),
                });
            }
            self.pushed.lock().push(path.to_string());
            Ok(())
        })
    }
}
