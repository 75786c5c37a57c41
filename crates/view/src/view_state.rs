use core_crate::{ProcessStep, BLOCK_HEIGHT_NOT_AVAILABLE};
use serde::Serialize;

/// Status label shown once the status feed has ended
pub const STATUS_UNAVAILABLE: &str = "Status unavailable";

/// Minimum number of digits of a displayed block height
const HEIGHT_WIDTH: usize = 8;

/// Display-ready projection of a block status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub block_height_label: String,
    pub status_label: String,
    pub show_details: bool,
    pub progression_percent: u32,
}

impl ViewState {
    /// View shown before any status arrived
    pub fn initial() -> Self {
        Self {
            block_height_label: format_height(BLOCK_HEIGHT_NOT_AVAILABLE),
            status_label: ProcessStep::NoBlockToProcess.label().to_string(),
            show_details: false,
            progression_percent: 0,
        }
    }

    /// View shown once the status feed is gone
    pub fn unavailable() -> Self {
        Self {
            status_label: STATUS_UNAVAILABLE.to_string(),
            ..Self::initial()
        }
    }
}

impl ViewState {
    /// Encode the view as JSON for a rendering front end
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Format a block height for display.
///
/// Heights are zero-padded to eight digits and never truncated. Only the
/// `-1` sentinel means no block is available; any other height, negative
/// ones included, is formatted as a number.
pub fn format_height(height: i64) -> String {
    if height == BLOCK_HEIGHT_NOT_AVAILABLE {
        return ProcessStep::NoBlockToProcess.label().to_string();
    }
    format!("Block {:0width$}", height, width = HEIGHT_WIDTH)
}

/// Percentage of `current` over `total`, truncated toward zero.
///
/// A zero total yields 0. The result is not bounded: `current > total`
/// gives more than 100.
pub fn compute_progress(current: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let percent = u128::from(current) * 100 / u128::from(total);
    u32::try_from(percent).unwrap_or(u32::MAX)
}
