use thiserror::Error;

use crate::subscription::SubscriptionId;

/// Errors that can occur while producing or consuming block status
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid block status: {0}")]
    InvalidState(String),

    #[error("Status source closed")]
    SourceClosed,

    #[error("Projector is not attached to a status source")]
    NotAttached,

    #[error("Projector already holds subscription {0}")]
    AlreadyAttached(SubscriptionId),
}
