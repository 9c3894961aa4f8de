//! Utility modules

pub mod error;

pub use error::{JobError, LabError, PipelineClosed, Result};
