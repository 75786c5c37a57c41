//! Display adapter for the block import status.
//!
//! This crate turns the stream of [`core_crate::BlockStatus`] snapshots into
//! display-ready [`ViewState`] values.

mod config;
mod projector;
mod sink;
mod view_state;

// Re-export public API
pub use config::{ProgressPolicy, ProgressionCarryOver, ProjectorConfig, ProjectorConfigBuilder};
pub use projector::BlockStatusProjector;
pub use sink::{JsonViewSink, LoggingViewSink, ViewSink};
pub use view_state::{compute_progress, format_height, ViewState, STATUS_UNAVAILABLE};
