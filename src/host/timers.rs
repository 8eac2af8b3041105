//! Tokio-backed timers.
//!
//! Each timer is a spawned task tracked by its [`AbortHandle`]. Clearing a
//! timer aborts the task; finished timeouts remove themselves.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, interval_at, sleep};
use tracing::trace;

use super::{IntervalCallback, TimeoutCallback, Timers};

// ============================================================================
// Constants
// ============================================================================

/// Shortest interval period accepted by the runtime.
const MIN_PERIOD: Duration = Duration::from_millis(1);

// ============================================================================
// TokioTimers
// ============================================================================

/// [`Timers`] implementation on a tokio runtime.
pub struct TokioTimers {
    /// Runtime the timer tasks are spawned on.
    handle: Handle,
    /// Next timer id.
    next_id: AtomicU64,
    /// Live timers by id.
    tasks: Arc<Mutex<FxHashMap<u64, AbortHandle>>>,
}

impl TokioTimers {
    /// Creates timers spawning on `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Creates timers on the current runtime.
    ///
    /// Returns `None` outside a tokio runtime.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Returns the number of live timers.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks.lock().len()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn cancel(&self, id: u64) {
        if let Some(task) = self.tasks.lock().remove(&id) {
            task.abort();
            trace!(id, "Timer cancelled");
        }
    }
}

impl Timers for TokioTimers {
    fn set_timeout(&self, callback: TimeoutCallback, delay: Duration) -> u64 {
        let id = self.allocate_id();
        let tasks = Arc::clone(&self.tasks);

        // Hold the lock across spawn so the task cannot remove itself first.
        let mut guard = self.tasks.lock();
        let task = self.handle.spawn(async move {
            sleep(delay).await;
            tasks.lock().remove(&id);
            callback();
        });
        guard.insert(id, task.abort_handle());
        id
    }

    fn clear_timeout(&self, id: u64) {
        self.cancel(id);
    }

    fn set_interval(&self, callback: IntervalCallback, period: Duration) -> u64 {
        let id = self.allocate_id();
        let period = period.max(MIN_PERIOD);

        let task = self.handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                callback();
            }
        });
        self.tasks.lock().insert(id, task.abort_handle());
        id
    }

    fn clear_interval(&self, id: u64) {
        self.cancel(id);
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
