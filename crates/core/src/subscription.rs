//! Subscription side of a block status source.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::StatusError;
use crate::types::BlockStatus;

/// Identifier handed out by a source for each registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback a source uses to forget a registration
pub type ReleaseHook = Arc<dyn Fn(SubscriptionId) + Send + Sync>;

/// A source that pushes block status snapshots to its subscribers
#[async_trait]
pub trait StatusSource: fmt::Debug + Send + Sync {
    /// Register a new subscriber
    async fn subscribe(&self) -> Result<Subscription, StatusError>;
}

/// A registration with a status source.
///
/// The registration is released exactly once, either through
/// [`Subscription::unsubscribe`] or when the handle is dropped.
pub struct Subscription {
    id: SubscriptionId,
    receiver: broadcast::Receiver<BlockStatus>,
    release: Option<ReleaseHook>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        receiver: broadcast::Receiver<BlockStatus>,
        release: ReleaseHook,
    ) -> Self {
        Self {
            id,
            receiver,
            release: Some(release),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next status.
    ///
    /// Returns `None` once the source has closed. Snapshots overwritten while
    /// this subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<BlockStatus> {
        loop {
            match self.receiver.recv().await {
                Ok(status) => return Some(status),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        subscription = %self.id,
                        skipped = count,
                        "Subscriber lagged, skipping stale statuses"
                    );
                }
            }
        }
    }

    /// Turn the subscription into a stream of statuses.
    ///
    /// The registration is released when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = BlockStatus> + Send + Unpin {
        Box::pin(stream::unfold(self, |mut subscription| async move {
            let status = subscription.recv().await?;
            Some((status, subscription))
        }))
    }

    /// Release the registration now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(subscription = %self.id, "Releasing status subscription");
            release(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
