//! Concurrency substrate shared by the experiments
//!
//! - CompletionLatch: count-down join point for spawned workers
//! - ShutdownSignal: cooperative cancellation flag

pub mod latch;
pub mod shutdown;

pub use latch::{CompletionLatch, LatchGuard};
pub use shutdown::ShutdownSignal;
