use std::fmt::Debug;

use async_trait::async_trait;
use core_crate::StatusError;
use tracing::info;

use crate::view_state::ViewState;

/// A render surface for projected views.
///
/// Implementors receive every new [`ViewState`] in delivery order.
#[async_trait]
pub trait ViewSink: Debug + Send + Sync {
    /// Render the latest view
    async fn render(&self, view: &ViewState) -> Result<(), StatusError>;
}

/// A sink that renders views as log lines
#[derive(Debug, Clone, Default)]
pub struct LoggingViewSink;

#[async_trait]
impl ViewSink for LoggingViewSink {
    async fn render(&self, view: &ViewState) -> Result<(), StatusError> {
        if view.show_details {
            info!(
                block = %view.block_height_label,
                progression = view.progression_percent,
                "{}",
                view.status_label
            );
        } else {
            info!(block = %view.block_height_label, "{}", view.status_label);
        }
        Ok(())
    }
}

/// A sink that prints every view as one JSON line on stdout
#[derive(Debug, Clone, Default)]
pub struct JsonViewSink;

#[async_trait]
impl ViewSink for JsonViewSink {
    async fn render(&self, view: &ViewState) -> Result<(), StatusError> {
        println!("{}", view.to_json()?);
        Ok(())
    }
}
