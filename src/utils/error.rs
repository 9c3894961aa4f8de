//! Error types for concurrency-lab

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Top-level library error
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synchronization timeout after {waited:?}: {completed}/{total} workers finished")]
    SynchronizationTimeout {
        completed: usize,
        total: usize,
        waited: Duration,
    },

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure reported by a job body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("worker could not be spawned: {0}")]
    SpawnFailed(String),
}

impl JobError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// The producer side of a pipeline has finished and the channel is drained.
///
/// This is the normal way a consumer loop ends.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pipeline closed")]
pub struct PipelineClosed;

pub type Result<T> = std::result::Result<T, LabError>;

/// Render a panic payload captured by `catch_unwind`
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
