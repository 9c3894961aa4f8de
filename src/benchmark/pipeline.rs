//! Single-producer / single-consumer pipeline
//!
//! The producer emits `1..=M` onto a bounded channel; capacity 0 makes every
//! send a rendezvous with the consumer. Dropping the sender after the last
//! message is the completion signal, which the consumer observes as
//! `PipelineClosed` once the buffer is drained.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::sync::ShutdownSignal;
use crate::utils::{LabError, PipelineClosed, Result};

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub capacity: usize,
    pub message_count: u64,
    /// Values in the order the consumer received them
    pub consumed: Vec<u64>,
    /// Sends that found the channel full and had to block
    pub producer_suspensions: u64,
    /// Producer stopped early because shutdown was requested
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// True when the consumer saw exactly `1..=message_count`
    pub fn is_complete(&self) -> bool {
        self.consumed.len() as u64 == self.message_count
            && self.consumed.iter().copied().eq(1..=self.message_count)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "capacity": self.capacity,
            "message_count": self.message_count,
            "consumed": self.consumed.len(),
            "in_order": self.is_complete(),
            "producer_suspensions": self.producer_suspensions,
            "cancelled": self.cancelled,
            "elapsed_secs": self.elapsed.as_secs_f64(),
        })
    }
}

struct ProducerStats {
    sent: u64,
    suspensions: u64,
}

/// Producer/consumer handoff through a channel of fixed capacity.
///
/// Single-use: `run` consumes the pipeline together with its shutdown signal.
pub struct Pipeline {
    capacity: usize,
    message_count: u64,
    consumer_delay: Option<Duration>,
    shutdown: ShutdownSignal,
}

impl Pipeline {
    pub fn new(capacity: usize, message_count: u64) -> Self {
        Self {
            capacity,
            message_count,
            consumer_delay: None,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Make the consumer pause after each message, forcing backpressure
    pub fn with_consumer_delay(mut self, delay: Duration) -> Self {
        self.consumer_delay = Some(delay);
        self
    }

    /// Handle another thread can use to stop the producer early
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn run(self) -> Result<PipelineReport> {
        // A buffer of M slots never fills, so any larger capacity behaves the same
        let slots = usize::try_from(self.message_count)
            .map(|m| self.capacity.min(m))
            .unwrap_or(self.capacity);
        let (tx, rx) = bounded::<u64>(slots);
        let start_time = Instant::now();

        let message_count = self.message_count;
        let shutdown = self.shutdown.clone();
        let producer = thread::Builder::new()
            .name("pipeline-producer".to_string())
            .spawn(move || produce(tx, message_count, &shutdown))?;

        let delay = self.consumer_delay;
        let expected = self.message_count.min(1 << 16) as usize;
        let consumer = match thread::Builder::new()
            .name("pipeline-consumer".to_string())
            .spawn(move || consume(rx, expected, delay))
        {
            Ok(handle) => handle,
            Err(e) => {
                // The receiver went down with the failed spawn, so the producer unblocks
                producer.join().ok();
                return Err(e.into());
            }
        };

        let stats = producer
            .join()
            .map_err(|_| LabError::Worker("pipeline producer panicked".to_string()))?;
        let consumed = consumer
            .join()
            .map_err(|_| LabError::Worker("pipeline consumer panicked".to_string()))?;
        let elapsed = start_time.elapsed();

        let cancelled = stats.sent < self.message_count;
        debug!(
            "Pipeline (capacity {}): sent {}, consumed {}, suspensions {}{}",
            self.capacity,
            stats.sent,
            consumed.len(),
            stats.suspensions,
            if cancelled { ", cancelled" } else { "" }
        );

        Ok(PipelineReport {
            capacity: self.capacity,
            message_count: self.message_count,
            consumed,
            producer_suspensions: stats.suspensions,
            cancelled,
            elapsed,
        })
    }
}

fn produce(tx: Sender<u64>, message_count: u64, shutdown: &ShutdownSignal) -> ProducerStats {
    let mut stats = ProducerStats {
        sent: 0,
        suspensions: 0,
    };

    for value in 1..=message_count {
        if shutdown.is_signaled() {
            break;
        }
        match tx.try_send(value) {
            Ok(()) => {}
            Err(TrySendError::Full(value)) => {
                stats.suspensions += 1;
                if tx.send(value).is_err() {
                    break;
                }
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
        stats.sent += 1;
    }

    // tx drops here: completion signal for the consumer
    stats
}

fn consume(rx: Receiver<u64>, expected: usize, delay: Option<Duration>) -> Vec<u64> {
    let mut consumed = Vec::with_capacity(expected);
    loop {
        match recv_next(&rx) {
            Ok(value) => {
                consumed.push(value);
                if let Some(delay) = delay {
                    thread::sleep(delay);
                }
            }
            Err(PipelineClosed) => break,
        }
    }
    consumed
}

/// Next message, or `PipelineClosed` once the producer is done and the buffer is empty
fn recv_next(rx: &Receiver<u64>) -> std::result::Result<u64, PipelineClosed> {
    rx.recv().map_err(|_| PipelineClosed)
}

/// Run a pipeline and return the consumer's observed sequence
pub fn run_pipeline(capacity: usize, message_count: u64) -> Result<Vec<u64>> {
    Pipeline::new(capacity, message_count)
        .run()
        .map(|report| report.consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbuffered_five() {
        assert_eq!(run_pipeline(0, 5).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_buffered_never_suspends() {
        let report = Pipeline::new(10, 3).run().unwrap();
        assert_eq!(report.consumed, vec![1, 2, 3]);
        assert_eq!(report.producer_suspensions, 0);
        assert!(!report.cancelled);
        assert!(report.is_complete());
    }

    #[test]
    fn test_huge_capacity_is_clamped() {
        assert_eq!(run_pipeline(usize::MAX, 3).unwrap(), vec![1, 2, 3]);

        let report = Pipeline::new(usize::MAX / 2, 5).run().unwrap();
        assert_eq!(report.capacity, usize::MAX / 2);
        assert_eq!(report.producer_suspensions, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn test_zero_messages() {
        for capacity in [0, 1, 8] {
            let report = Pipeline::new(capacity, 0).run().unwrap();
            assert!(report.consumed.is_empty());
            assert!(report.is_complete());
            assert!(!report.cancelled);
        }
    }

    #[test]
    fn test_order_across_capacities() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..15 {
            let capacity = rng.usize(0..32);
            let count = rng.u64(0..500);
            let consumed = run_pipeline(capacity, count).unwrap();
            assert_eq!(consumed, (1..=count).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_slow_consumer_backpressure() {
        let report = Pipeline::new(1, 10)
            .with_consumer_delay(Duration::from_millis(5))
            .run()
            .unwrap();

        assert!(report.is_complete());
        assert!(report.producer_suspensions > 0);
    }

    #[test]
    fn test_shutdown_before_start() {
        let pipeline = Pipeline::new(4, 100);
        pipeline.shutdown_handle().signal();

        let report = pipeline.run().unwrap();
        assert!(report.cancelled);
        assert!(report.consumed.is_empty());
    }

    #[test]
    fn test_shutdown_mid_run_keeps_prefix() {
        let pipeline = Pipeline::new(0, 10_000).with_consumer_delay(Duration::from_millis(1));
        let handle = pipeline.shutdown_handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.signal();
        });

        let report = pipeline.run().unwrap();
        stopper.join().unwrap();

        assert!(report.cancelled);
        let n = report.consumed.len() as u64;
        assert!(n < 10_000);
        assert_eq!(report.consumed, (1..=n).collect::<Vec<_>>());
    }

    #[test]
    fn test_stale_handle_does_not_cancel_next_pipeline() {
        let first = Pipeline::new(0, 3);
        let handle = first.shutdown_handle();
        assert!(first.run().unwrap().is_complete());

        handle.signal();
        let second = Pipeline::new(0, 3).run().unwrap();
        assert!(!second.cancelled);
        assert_eq!(second.consumed, vec![1, 2, 3]);
    }

    #[test]
    fn test_report_json() {
        let report = Pipeline::new(2, 4).run().unwrap();
        let json = report.to_json();
        assert_eq!(json["consumed"], 4);
        assert_eq!(json["in_order"], true);
    }
}
