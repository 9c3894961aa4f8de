//! Shared counter under a selectable synchronization discipline
//!
//! The counter is the ONLY cross-worker mutable state in a counter benchmark.
//! Each run owns one instance and hands it to workers through an `Arc`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

/// Synchronization discipline guarding the shared counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Lock, increment, unlock
    Locked,
    /// Hardware fetch-and-add
    Atomic,
}

impl SyncMode {
    /// Parse mode from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "locked" | "lock" | "mutex" => Some(Self::Locked),
            "atomic" => Some(Self::Atomic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Atomic => "ATOMIC",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single integer together with the primitive that guards it.
///
/// Never mixes disciplines: the variant fixed at construction is the only
/// way the value is mutated.
pub enum SharedCounter {
    Locked(Mutex<u64>),
    Atomic(AtomicU64),
}

impl SharedCounter {
    pub fn new(mode: SyncMode) -> Self {
        match mode {
            SyncMode::Locked => Self::Locked(Mutex::new(0)),
            SyncMode::Atomic => Self::Atomic(AtomicU64::new(0)),
        }
    }

    pub fn mode(&self) -> SyncMode {
        match self {
            Self::Locked(_) => SyncMode::Locked,
            Self::Atomic(_) => SyncMode::Atomic,
        }
    }

    /// Add one to the counter
    #[inline]
    pub fn increment(&self) {
        match self {
            Self::Locked(value) => {
                let mut guard = value.lock();
                *guard += 1;
            }
            Self::Atomic(value) => {
                value.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Current value.
    ///
    /// Exact once every incrementing worker has been joined; before that it is
    /// a progress snapshot.
    pub fn value(&self) -> u64 {
        match self {
            Self::Locked(value) => *value.lock(),
            Self::Atomic(value) => value.load(Ordering::Acquire),
        }
    }
}

impl fmt::Debug for SharedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCounter")
            .field("mode", &self.mode())
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_parse_mode() {
        assert_eq!(SyncMode::parse("locked"), Some(SyncMode::Locked));
        assert_eq!(SyncMode::parse("MUTEX"), Some(SyncMode::Locked));
        assert_eq!(SyncMode::parse("Atomic"), Some(SyncMode::Atomic));
        assert_eq!(SyncMode::parse("spin"), None);
    }

    #[test]
    fn test_single_thread_increments() {
        for mode in [SyncMode::Locked, SyncMode::Atomic] {
            let counter = SharedCounter::new(mode);
            assert_eq!(counter.mode(), mode);
            for _ in 0..5 {
                counter.increment();
            }
            assert_eq!(counter.value(), 5);
        }
    }

    #[test]
    fn test_concurrent_increments() {
        for mode in [SyncMode::Locked, SyncMode::Atomic] {
            let counter = Arc::new(SharedCounter::new(mode));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = Arc::clone(&counter);
                    thread::spawn(move || {
                        for _ in 0..500 {
                            c.increment();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(counter.value(), 2000);
        }
    }
}
