// Core module for block status reporting
mod error;
mod logging;
mod subscription;
mod types;

// Re-export public API
pub use error::StatusError;
pub use logging::{init_default_logging, init_logging, init_subscriber};
pub use subscription::{ReleaseHook, StatusSource, Subscription, SubscriptionId};
pub use types::{BlockStatus, ProcessStep, BLOCK_HEIGHT_NOT_AVAILABLE};

// Re-export dependencies needed by consumers
pub use async_trait;
pub use tokio;
