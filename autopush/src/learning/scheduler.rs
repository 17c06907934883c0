//! Warm-up timer abstraction.
//!
//! The learning cache schedules one evaluation per tracking window. It does
//! so through [`WarmupScheduler`] so the timer source can be swapped:
//!
//! - [`TokioScheduler`] - real time, one spawned task per window
//! - [`ManualScheduler`] - virtual clock advanced explicitly (tests, log replay)

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;

/// Deferred work run once when its delay elapses.
pub type WarmupTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay.
///
/// There is no cancellation. Tasks must tolerate firing after the state they
/// refer to has gone away.
pub trait WarmupScheduler: Send + Sync {
    /// Schedule `task` to run once after `delay`.
    fn schedule(&self, delay: Duration, task: WarmupTask);
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler on the runtime the caller is running in.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl WarmupScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: WarmupTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

struct PendingTask {
    due: Duration,
    seq: u64,
    task: WarmupTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Scheduler driven by a virtual clock.
///
/// Nothing runs until [`advance`](Self::advance) moves the clock past a
/// task's due time. Tasks with equal due times run in scheduling order.
///
/// # Example
///
/// ```
/// use autopush::learning::{ManualScheduler, WarmupScheduler};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let scheduler = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// scheduler.schedule(Duration::from_millis(10), Box::new(move || {
///     flag.store(true, Ordering::SeqCst);
/// }));
///
/// scheduler.advance(Duration::from_millis(5));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_millis(5));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("pending", &clock.pending.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of tasks waiting to fire.
    pub fn pending(&self) -> usize {
        self.clock.lock().pending.len()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    ///
    /// Tasks run without the clock lock held, so they may schedule more
    /// work; anything they schedule inside the window also runs.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        self.advance_to(target)
    }

    /// Move the clock to `target` (never backwards), running due tasks.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let mut clock = self.clock.lock();
                let due_index = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                match due_index {
                    Some(i) => {
                        let pending = clock.pending.swap_remove(i);
                        clock.now = clock.now.max(pending.due);
                        Some(pending.task)
                    }
                    None => {
                        clock.now = clock.now.max(target);
                        None
                    }
                }
            };

            match next {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }
}

impl WarmupScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: WarmupTask) {
        let mut clock = self.clock.lock();
        let due = clock.now + delay;
        let seq = clock.next_seq;
        clock.next_seq += 1;
        clock.pending.push(PendingTask { due, seq, task });
    }
}
