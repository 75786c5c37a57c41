use std::future::Future;

use core_crate::{BlockStatus, ProcessStep, StatusError, StatusSource, Subscription, SubscriptionId};
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{ProgressionCarryOver, ProjectorConfig};
use crate::sink::ViewSink;
use crate::view_state::{compute_progress, format_height, ViewState};

/// Projects block status snapshots onto a display view.
///
/// The projector holds at most one subscription to a [`StatusSource`]. The
/// subscription is released on [`BlockStatusProjector::detach`] or when the
/// projector is dropped.
#[derive(Debug)]
pub struct BlockStatusProjector {
    config: ProjectorConfig,

    /// Current display snapshot
    view: ViewState,

    /// Registration with the status source, if attached
    subscription: Option<Subscription>,
}

impl BlockStatusProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self {
            config,
            view: ViewState::initial(),
            subscription: None,
        }
    }

    /// The current view
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to a status source and hold the registration
    pub async fn attach(&mut self, source: &dyn StatusSource) -> Result<SubscriptionId, StatusError> {
        if let Some(subscription) = &self.subscription {
            return Err(StatusError::AlreadyAttached(subscription.id()));
        }

        let subscription = source.subscribe().await?;
        let id = subscription.id();
        info!(subscription = %id, "Projector attached to status source");
        self.subscription = Some(subscription);
        Ok(id)
    }

    /// Release the subscription, returns whether one was held
    pub fn detach(&mut self) -> bool {
        match self.subscription.take() {
            Some(subscription) => {
                info!(subscription = %subscription.id(), "Projector detached from status source");
                subscription.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Project one status onto the view
    pub fn project_status(&mut self, status: &BlockStatus) -> &ViewState {
        let (show_details, progression) = match status.process_step {
            ProcessStep::NoBlockToProcess => (false, None),
            ProcessStep::NewBlockToProcess => (true, None),
            ProcessStep::LoadingTransactions => (
                true,
                Some(compute_progress(
                    status.loaded_transactions,
                    status.transaction_count,
                )),
            ),
            ProcessStep::ProcessingAddresses => (
                true,
                Some(compute_progress(
                    status.processed_addresses,
                    status.address_count,
                )),
            ),
            ProcessStep::ProcessingTransactions => (
                true,
                Some(compute_progress(
                    status.processed_transactions,
                    status.transaction_count,
                )),
            ),
            ProcessStep::SavingBlock => (true, Some(100)),
            ProcessStep::BlockSaved => (true, Some(100)),
        };

        let progression_percent = match progression {
            Some(progression) => self.config.progress_policy.apply(progression),
            None => match self.config.progression_carry_over {
                ProgressionCarryOver::Keep => self.view.progression_percent,
                ProgressionCarryOver::Reset => 0,
            },
        };

        self.view = ViewState {
            block_height_label: format_height(status.block_height),
            status_label: status.process_step.label().to_string(),
            show_details,
            progression_percent,
        };

        debug!(
            block_height = status.block_height,
            step = ?status.process_step,
            progression = progression_percent,
            "Projected block status"
        );

        &self.view
    }

    /// Project a JSON encoded status.
    ///
    /// A payload that does not decode leaves the current view untouched.
    pub fn apply_json(&mut self, raw: &str) -> Result<&ViewState, StatusError> {
        match BlockStatus::from_json(raw) {
            Ok(status) => Ok(self.project_status(&status)),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed block status");
                Err(StatusError::InvalidState(e.to_string()))
            }
        }
    }

    /// Wait for the next status from the subscription and project it.
    ///
    /// Returns `None` when the source has closed; the view then switches to
    /// the unavailable state and the subscription is released.
    pub async fn next_view(&mut self) -> Result<Option<ViewState>, StatusError> {
        let subscription = self.subscription.as_mut().ok_or(StatusError::NotAttached)?;

        let received = subscription.recv().await;
        match received {
            Some(status) => Ok(Some(self.project_status(&status).clone())),
            None => {
                warn!("Status source closed, status is now unavailable");
                self.view = ViewState::unavailable();
                self.detach();
                Ok(None)
            }
        }
    }

    /// Project every status of a stream and render each view.
    ///
    /// Returns the number of statuses projected. The view switches to the
    /// unavailable state once the stream ends.
    pub async fn project_stream<S>(
        &mut self,
        mut stream: S,
        sink: &dyn ViewSink,
    ) -> Result<usize, StatusError>
    where
        S: Stream<Item = BlockStatus> + Unpin,
    {
        let mut projected = 0;
        while let Some(status) = stream.next().await {
            let view = self.project_status(&status).clone();
            sink.render(&view).await?;
            projected += 1;
        }

        debug!(projected, "Status stream ended");
        self.view = ViewState::unavailable();
        sink.render(&self.view).await?;
        Ok(projected)
    }

    /// Render every view until the source closes or `shutdown` completes.
    ///
    /// The subscription is released before returning the last view.
    pub async fn run<F>(mut self, sink: &dyn ViewSink, shutdown: F) -> Result<ViewState, StatusError>
    where
        F: Future<Output = ()>,
    {
        if !self.is_attached() {
            return Err(StatusError::NotAttached);
        }

        info!("Block status projector started");
        sink.render(&self.view).await?;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping block status projector");
                    break;
                }
                next = self.next_view() => match next? {
                    Some(view) => sink.render(&view).await?,
                    None => {
                        sink.render(&self.view).await?;
                        break;
                    }
                },
            }
        }

        self.detach();
        Ok(self.view.clone())
    }
}

impl Default for BlockStatusProjector {
    fn default() -> Self {
        Self::new(ProjectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProgressPolicy, ProjectorConfigBuilder};
    use async_trait::async_trait;
    use core_crate::ReleaseHook;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    /// A source recording every subscribe and unsubscribe call
    #[derive(Debug)]
    struct RecordingSource {
        sender: broadcast::Sender<BlockStatus>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSource {
        fn new() -> Self {
            let (sender, _) = broadcast::channel(16);
            Self {
                sender,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, status: BlockStatus) {
            self.sender.send(status).unwrap();
        }
    }

    #[async_trait]
    impl StatusSource for RecordingSource {
        async fn subscribe(&self) -> Result<Subscription, StatusError> {
            let mut calls = self.calls.lock().unwrap();
            let id = SubscriptionId::new(calls.len() as u64 + 1);
            calls.push(format!("subscribe {}", id));

            let log = self.calls.clone();
            let release: ReleaseHook =
                Arc::new(move |id| log.lock().unwrap().push(format!("unsubscribe {}", id)));
            Ok(Subscription::new(id, self.sender.subscribe(), release))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        views: Mutex<Vec<ViewState>>,
    }

    #[async_trait]
    impl ViewSink for RecordingSink {
        async fn render(&self, view: &ViewState) -> Result<(), StatusError> {
            self.views.lock().unwrap().push(view.clone());
            Ok(())
        }
    }

    fn status(height: i64, step: ProcessStep) -> BlockStatus {
        BlockStatus::at_step(height, step)
    }

    #[test]
    fn test_processing_addresses_scenario() {
        let mut projector = BlockStatusProjector::default();
        let mut input = status(700000, ProcessStep::ProcessingAddresses);
        input.processed_addresses = 3;
        input.address_count = 12;

        let view = projector.project_status(&input);

        assert_eq!(
            *view,
            ViewState {
                block_height_label: "Block 00700000".to_string(),
                status_label: "Processing addresses...".to_string(),
                show_details: true,
                progression_percent: 25,
            }
        );
    }

    #[test]
    fn test_no_block_keeps_previous_progression() {
        let mut projector = BlockStatusProjector::default();
        let mut loading = status(10, ProcessStep::LoadingTransactions);
        loading.loaded_transactions = 2;
        loading.transaction_count = 5;
        projector.project_status(&loading);

        let view = projector.project_status(&BlockStatus::idle()).clone();

        assert_eq!(view.block_height_label, "No block to process");
        assert_eq!(view.status_label, "No block to process");
        assert!(!view.show_details);
        assert_eq!(view.progression_percent, 40);
    }

    #[test]
    fn test_new_block_keeps_previous_progression() {
        let mut projector = BlockStatusProjector::default();
        projector.project_status(&status(10, ProcessStep::BlockSaved));

        let view = projector.project_status(&status(11, ProcessStep::NewBlockToProcess));

        assert_eq!(view.status_label, "New block to process");
        assert!(view.show_details);
        assert_eq!(view.progression_percent, 100);
    }

    #[test]
    fn test_reset_carry_over_zeroes_progression() {
        let config = ProjectorConfigBuilder::new()
            .with_progression_carry_over(ProgressionCarryOver::Reset)
            .build();
        let mut projector = BlockStatusProjector::new(config);
        projector.project_status(&status(10, ProcessStep::BlockSaved));

        assert_eq!(
            projector
                .project_status(&status(11, ProcessStep::NewBlockToProcess))
                .progression_percent,
            0
        );
        projector.project_status(&status(11, ProcessStep::SavingBlock));
        assert_eq!(
            projector
                .project_status(&BlockStatus::idle())
                .progression_percent,
            0
        );
    }

    #[test]
    fn test_saving_block_ignores_counters() {
        let mut projector = BlockStatusProjector::default();
        let mut saving = status(5, ProcessStep::SavingBlock);
        saving.processed_transactions = 1;
        saving.transaction_count = 1000;
        saving.loaded_transactions = 3;

        assert_eq!(projector.project_status(&saving).progression_percent, 100);
    }

    #[test]
    fn test_no_block_never_shows_details() {
        let mut projector = BlockStatusProjector::default();
        for height in [-1, 0, 42, 700000] {
            projector.project_status(&status(height, ProcessStep::ProcessingTransactions));
            assert!(
                !projector
                    .project_status(&status(height, ProcessStep::NoBlockToProcess))
                    .show_details
            );
        }
    }

    #[test]
    fn test_every_step_has_its_label() {
        let steps = [
            (ProcessStep::NoBlockToProcess, "No block to process"),
            (ProcessStep::NewBlockToProcess, "New block to process"),
            (
                ProcessStep::LoadingTransactions,
                "Loading transactions from bitcoin core...",
            ),
            (ProcessStep::ProcessingAddresses, "Processing addresses..."),
            (ProcessStep::ProcessingTransactions, "Processing transactions..."),
            (ProcessStep::SavingBlock, "Saving block..."),
            (ProcessStep::BlockSaved, "Block saved"),
        ];

        let mut projector = BlockStatusProjector::default();
        for (step, label) in steps {
            assert_eq!(projector.project_status(&status(1, step)).status_label, label);
        }
    }

    #[test]
    fn test_overflowing_progression_is_clamped_by_default() {
        let mut projector = BlockStatusProjector::default();
        let mut processing = status(1, ProcessStep::ProcessingTransactions);
        processing.processed_transactions = 300;
        processing.transaction_count = 200;

        assert_eq!(projector.project_status(&processing).progression_percent, 100);
    }

    #[test]
    fn test_raw_policy_keeps_overflowing_progression() {
        let config = ProjectorConfigBuilder::new()
            .with_progress_policy(ProgressPolicy::Raw)
            .build();
        let mut projector = BlockStatusProjector::new(config);
        let mut processing = status(1, ProcessStep::ProcessingTransactions);
        processing.processed_transactions = 300;
        processing.transaction_count = 200;

        assert_eq!(projector.project_status(&processing).progression_percent, 150);
    }

    #[test]
    fn test_clamped_progression_is_always_a_percentage() {
        let mut projector = BlockStatusProjector::default();
        for total in 0..40u64 {
            for current in 0..80u64 {
                let mut loading = status(1, ProcessStep::LoadingTransactions);
                loading.loaded_transactions = current;
                loading.transaction_count = total;
                assert!(projector.project_status(&loading).progression_percent <= 100);
            }
        }
    }

    #[test]
    fn test_malformed_json_retains_view() {
        let mut projector = BlockStatusProjector::default();
        projector
            .apply_json(r#"{"blockHeight": 42, "processStep": "SAVING_BLOCK"}"#)
            .expect("valid payload");
        let before = projector.view().clone();

        let result = projector.apply_json(r#"{"blockHeight": 43, "processStep": "REINDEXING"}"#);

        assert!(matches!(result, Err(StatusError::InvalidState(_))));
        assert_eq!(*projector.view(), before);
        assert_eq!(before.block_height_label, "Block 00000042");
    }

    #[tokio::test]
    async fn test_attach_and_detach_are_recorded() {
        let source = RecordingSource::new();
        let mut projector = BlockStatusProjector::default();

        let id = projector.attach(&source).await.expect("attach");
        assert!(projector.is_attached());
        assert!(matches!(
            projector.attach(&source).await,
            Err(StatusError::AlreadyAttached(held)) if held == id
        ));

        assert!(projector.detach());
        assert!(!projector.detach());
        assert_eq!(source.calls(), vec!["subscribe #1", "unsubscribe #1"]);
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let source = RecordingSource::new();
        {
            let mut projector = BlockStatusProjector::default();
            projector.attach(&source).await.expect("attach");
        }
        assert_eq!(source.calls(), vec!["subscribe #1", "unsubscribe #1"]);
    }

    #[tokio::test]
    async fn test_next_view_requires_subscription() {
        let mut projector = BlockStatusProjector::default();
        assert!(matches!(
            projector.next_view().await,
            Err(StatusError::NotAttached)
        ));
    }

    #[tokio::test]
    async fn test_next_view_projects_delivered_status() {
        let source = RecordingSource::new();
        let mut projector = BlockStatusProjector::default();
        projector.attach(&source).await.expect("attach");

        source.push(status(7, ProcessStep::SavingBlock));

        let view = timeout(Duration::from_millis(100), projector.next_view())
            .await
            .expect("timeout")
            .expect("next view")
            .expect("open stream");
        assert_eq!(view.block_height_label, "Block 00000007");
        assert_eq!(view.progression_percent, 100);
    }

    #[tokio::test]
    async fn test_closed_source_makes_status_unavailable() {
        let source = RecordingSource::new();
        let mut projector = BlockStatusProjector::default();
        projector.attach(&source).await.expect("attach");
        source.push(status(7, ProcessStep::BlockSaved));
        let RecordingSource { sender, calls } = source;
        drop(sender);

        assert!(projector.next_view().await.expect("view").is_some());
        assert!(projector.next_view().await.expect("view").is_none());

        assert_eq!(*projector.view(), ViewState::unavailable());
        assert!(!projector.is_attached());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_project_stream_renders_every_status() {
        let sink = RecordingSink::default();
        let mut projector = BlockStatusProjector::default();
        let statuses = vec![
            status(1, ProcessStep::NewBlockToProcess),
            status(1, ProcessStep::SavingBlock),
            status(1, ProcessStep::BlockSaved),
        ];

        let projected = projector
            .project_stream(futures::stream::iter(statuses), &sink)
            .await
            .expect("project stream");

        let views = sink.views.lock().unwrap();
        assert_eq!(projected, 3);
        assert_eq!(views.len(), 4);
        assert_eq!(views[2].status_label, "Block saved");
        assert_eq!(views[3], ViewState::unavailable());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_and_releases() {
        let source = RecordingSource::new();
        let sink = RecordingSink::default();
        let mut projector = BlockStatusProjector::default();
        projector.attach(&source).await.expect("attach");

        let last = timeout(Duration::from_millis(500), projector.run(&sink, async {}))
            .await
            .expect("timeout")
            .expect("run");

        assert_eq!(last, ViewState::initial());
        assert_eq!(source.calls(), vec!["subscribe #1", "unsubscribe #1"]);
    }
}
