use std::collections::{HashSet, VecDeque};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use core_crate::{
    BlockStatus, ProcessStep, ReleaseHook, StatusError, StatusSource, Subscription,
    SubscriptionId,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};

use crate::config::StatusServiceConfig;

/// Severity of a status log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// One line of the import log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// The status service the import batch reports to.
///
/// Every step transition publishes a complete [`BlockStatus`] snapshot to
/// all live subscriptions and keeps it as the current status.
pub struct StatusService {
    config: StatusServiceConfig,

    /// Broadcast side of the feed, `None` once closed
    sender: Mutex<Option<broadcast::Sender<BlockStatus>>>,

    /// Last published status
    current: Mutex<BlockStatus>,

    /// Live registrations, shared with the release hooks
    subscriptions: Arc<Mutex<HashSet<SubscriptionId>>>,

    next_subscription_id: AtomicU64,

    imported_block_count: AtomicU64,

    logs: Mutex<VecDeque<LogEntry>>,
}

impl StatusService {
    /// Create a new status service.
    ///
    /// A zero channel capacity is raised to one.
    pub fn new(config: StatusServiceConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            sender: Mutex::new(Some(sender)),
            current: Mutex::new(BlockStatus::idle()),
            subscriptions: Arc::new(Mutex::new(HashSet::new())),
            next_subscription_id: AtomicU64::new(1),
            imported_block_count: AtomicU64::new(0),
            logs: Mutex::new(VecDeque::new()),
        }
    }

    /// The last published status
    pub fn current(&self) -> BlockStatus {
        lock(&self.current).clone()
    }

    /// Number of registrations not yet released
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    /// Whether the feed has been closed
    pub fn is_closed(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Publish a status as-is
    pub fn publish(&self, status: BlockStatus) {
        self.update(|current| *current = status);
    }

    /// The backend is idle
    pub fn no_block_to_process(&self) {
        self.publish(BlockStatus::idle());
    }

    /// A new block has been picked up
    pub fn new_block_to_process(&self, block_height: u64) {
        let height = i64::try_from(block_height).unwrap_or(i64::MAX);
        self.publish(BlockStatus::at_step(height, ProcessStep::NewBlockToProcess));
    }

    /// Transactions are being fetched from bitcoin core
    pub fn loading_transactions(&self, loaded: u64, total: u64) {
        self.update(|status| {
            status.process_step = ProcessStep::LoadingTransactions;
            status.loaded_transactions = loaded;
            status.transaction_count = total;
        });
    }

    /// Addresses of the block are being processed
    pub fn processing_addresses(&self, processed: u64, total: u64) {
        self.update(|status| {
            status.process_step = ProcessStep::ProcessingAddresses;
            status.processed_addresses = processed;
            status.address_count = total;
        });
    }

    /// Transactions of the block are being processed
    pub fn processing_transactions(&self, processed: u64, total: u64) {
        self.update(|status| {
            status.process_step = ProcessStep::ProcessingTransactions;
            status.processed_transactions = processed;
            status.transaction_count = total;
        });
    }

    /// The block is being written
    pub fn saving_block(&self) {
        self.update(|status| status.process_step = ProcessStep::SavingBlock);
    }

    /// The block has been written
    pub fn block_saved(&self) {
        self.update(|status| status.process_step = ProcessStep::BlockSaved);
    }

    /// Record the height of the last imported block
    pub fn set_imported_block_count(&self, count: u64) {
        debug!(count, "Updating imported block count");
        self.imported_block_count.store(count, Ordering::SeqCst);
    }

    pub fn imported_block_count(&self) -> u64 {
        self.imported_block_count.load(Ordering::SeqCst)
    }

    /// Add a message to the import log
    pub fn add_log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push_log(LogLevel::Info, message);
    }

    /// Add an error to the import log
    pub fn add_error(&self, message: impl Into<String>, cause: Option<&dyn std::error::Error>) {
        let message = message.into();
        match cause {
            Some(cause) => error!(error = %cause, "{}", message),
            None => error!("{}", message),
        }
        self.push_log(LogLevel::Error, message);
    }

    /// Retained log entries, oldest first
    pub fn logs(&self) -> Vec<LogEntry> {
        lock(&self.logs).iter().cloned().collect()
    }

    /// Close the feed; every subscriber sees the end of the stream
    pub fn close(&self) {
        if lock(&self.sender).take().is_some() {
            info!("Closing status feed");
        }
    }

    /// Apply a change to the current status and broadcast the result.
    ///
    /// The `current` guard is held while sending so that subscribers see
    /// statuses in the same order as `current()` is updated.
    fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut BlockStatus),
    {
        let mut current = lock(&self.current);
        apply(&mut current);
        self.send(current.clone());
    }

    fn send(&self, status: BlockStatus) {
        trace!(
            block_height = status.block_height,
            step = ?status.process_step,
            "Publishing block status"
        );

        if let Some(sender) = lock(&self.sender).as_ref() {
            // No receivers is not an error, the status is still kept as current
            let _ = sender.send(status);
        }
    }

    fn push_log(&self, level: LogLevel, message: String) {
        if self.config.log_capacity == 0 {
            return;
        }
        let mut logs = lock(&self.logs);
        while logs.len() >= self.config.log_capacity {
            logs.pop_front();
        }
        logs.push_back(LogEntry { level, message });
    }
}

#[async_trait]
impl StatusSource for StatusService {
    async fn subscribe(&self) -> Result<Subscription, StatusError> {
        let receiver = match lock(&self.sender).as_ref() {
            Some(sender) => sender.subscribe(),
            None => return Err(StatusError::SourceClosed),
        };

        let id = SubscriptionId::new(self.next_subscription_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.subscriptions).insert(id);

        let subscriptions = self.subscriptions.clone();
        let release: ReleaseHook = Arc::new(move |id| {
            lock(&subscriptions).remove(&id);
        });

        info!(subscription = %id, "New status subscription");
        Ok(Subscription::new(id, receiver, release))
    }
}

impl Debug for StatusService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusService")
            .field("config", &self.config)
            .field("current", &self.current())
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
