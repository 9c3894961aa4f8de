//! Configuration module

pub mod cli;
pub mod lab_config;

pub use cli::{CliArgs, SyncModeArg};
pub use lab_config::{LabConfig, TaskConfig};
