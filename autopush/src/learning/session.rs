//! Connection handles.
//!
//! The learning cache keys tracking windows by connection. Rather than hold
//! any reference to the connection itself, callers obtain a [`SessionId`]
//! when a connection opens and report it closed when it ends; the cache then
//! drops whatever it was tracking for that id.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Opaque per-connection handle. Ids are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a caller-chosen id (e.g. a transport connection number).
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Issues session ids and tracks which are still open.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    open: Mutex<HashSet<SessionId>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh id and mark it open.
    pub fn open(&self) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.open.lock().insert(id);
        id
    }

    /// Mark `id` closed. Returns `false` if it was not open.
    pub fn close(&self, id: SessionId) -> bool {
        self.open.lock().remove(&id)
    }

    /// Whether `id` is currently open.
    pub fn is_open(&self, id: SessionId) -> bool {
        self.open.lock().contains(&id)
    }

    /// Number of open sessions.
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }
}
