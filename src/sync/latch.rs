//! Count-down completion latch
//!
//! Workers call `count_down` once when they finish; the coordinating thread
//! blocks in `wait` / `wait_timeout` until the count reaches zero.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Latch that releases waiters once `count` workers have checked in
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    total: usize,
    released: Condvar,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            total: count,
            released: Condvar::new(),
        }
    }

    /// Record one finished worker. Extra calls past zero are ignored.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.released.notify_all();
        }
    }

    /// Number of workers that have checked in so far
    pub fn completed(&self) -> usize {
        self.total - *self.remaining.lock()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_released(&self) -> bool {
        *self.remaining.lock() == 0
    }

    /// Guard that counts down when dropped, including during a panic unwind
    pub fn guard(self: &Arc<Self>) -> LatchGuard {
        LatchGuard {
            latch: Arc::clone(self),
        }
    }

    /// Block until every worker has checked in
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    /// Block until every worker has checked in or `timeout` elapses.
    ///
    /// Returns `true` if the latch was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.released.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }
}

/// Counts its latch down exactly once, on drop
pub struct LatchGuard {
    latch: Arc<CompletionLatch>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}
