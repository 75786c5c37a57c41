//! Status feed for the block import batch.
//!
//! This crate provides the in-process status service that the import batch
//! reports its progress to, and that status views subscribe to.

mod config;
mod service;
mod statistics;

// Re-export public API
pub use config::{StatusServiceBuilder, StatusServiceConfig};
pub use service::{LogEntry, LogLevel, StatusService};
pub use statistics::ImportStatistics;
