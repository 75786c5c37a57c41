use std::sync::Arc;

use tracing::{debug, info};

use crate::service::StatusService;

/// Configuration for the status service
#[derive(Debug, Clone)]
pub struct StatusServiceConfig {
    /// Statuses buffered per subscriber before the oldest are dropped
    pub channel_capacity: usize,

    /// Log and error entries kept in the history
    pub log_capacity: usize,
}

impl Default for StatusServiceConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            log_capacity: 100,
        }
    }
}

/// A builder for the status service
pub struct StatusServiceBuilder {
    /// The configuration being built
    config: StatusServiceConfig,
}

impl StatusServiceBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        info!("Creating new StatusServiceBuilder with default configuration");

        Self {
            config: StatusServiceConfig::default(),
        }
    }

    /// Set the per-subscriber channel capacity
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        debug!(channel_capacity, "Setting channel capacity");
        self.config.channel_capacity = channel_capacity;
        self
    }

    /// Set how many log entries are retained
    pub fn with_log_capacity(mut self, log_capacity: usize) -> Self {
        debug!(log_capacity, "Setting log capacity");
        self.config.log_capacity = log_capacity;
        self
    }

    /// Build the status service
    pub fn build(self) -> StatusService {
        info!(
            channel_capacity = self.config.channel_capacity,
            log_capacity = self.config.log_capacity,
            "Building StatusService"
        );
        StatusService::new(self.config)
    }

    /// Build and return as Arc for shared ownership
    pub fn build_shared(self) -> Arc<StatusService> {
        Arc::new(self.build())
    }
}

impl Default for StatusServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
