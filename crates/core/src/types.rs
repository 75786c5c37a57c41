use serde::{Deserialize, Serialize};
use std::fmt;

/// Block height reported while no block is being processed
pub const BLOCK_HEIGHT_NOT_AVAILABLE: i64 = -1;

/// The phase the backend is in while importing one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProcessStep {
    #[default]
    #[serde(rename = "NO_BLOCK_TO_PROCESS")]
    NoBlockToProcess,

    #[serde(rename = "NEW_BLOCK_TO_PROCESS")]
    NewBlockToProcess,

    #[serde(rename = "LOADING_TRANSACTIONS_FROM_BITCOIN_CORE")]
    LoadingTransactions,

    #[serde(rename = "PROCESSING_ADDRESSES")]
    ProcessingAddresses,

    #[serde(rename = "PROCESSING_TRANSACTIONS")]
    ProcessingTransactions,

    #[serde(rename = "SAVING_BLOCK")]
    SavingBlock,

    #[serde(rename = "BLOCK_SAVED")]
    BlockSaved,
}

impl ProcessStep {
    /// Human readable description of the step
    pub fn label(self) -> &'static str {
        match self {
            ProcessStep::NoBlockToProcess => "No block to process",
            ProcessStep::NewBlockToProcess => "New block to process",
            ProcessStep::LoadingTransactions => "Loading transactions from bitcoin core...",
            ProcessStep::ProcessingAddresses => "Processing addresses...",
            ProcessStep::ProcessingTransactions => "Processing transactions...",
            ProcessStep::SavingBlock => "Saving block...",
            ProcessStep::BlockSaved => "Block saved",
        }
    }
}

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the block import progress at one point in time.
///
/// Counters that do not apply to the current step are left at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatus {
    /// Height of the block being processed, `-1` when there is none
    pub block_height: i64,

    /// Current import step
    pub process_step: ProcessStep,

    /// Number of transactions in the block
    #[serde(default)]
    pub transaction_count: u64,

    /// Transactions fetched from bitcoin core so far
    #[serde(default)]
    pub loaded_transactions: u64,

    /// Number of distinct addresses in the block
    #[serde(default)]
    pub address_count: u64,

    /// Addresses processed so far
    #[serde(default)]
    pub processed_addresses: u64,

    /// Transactions processed so far
    #[serde(default)]
    pub processed_transactions: u64,
}

impl BlockStatus {
    /// Status reported while the backend is idle
    pub fn idle() -> Self {
        Self::at_step(BLOCK_HEIGHT_NOT_AVAILABLE, ProcessStep::NoBlockToProcess)
    }

    /// Status for a block at a given step with all counters cleared
    pub fn at_step(block_height: i64, process_step: ProcessStep) -> Self {
        Self {
            block_height,
            process_step,
            transaction_count: 0,
            loaded_transactions: 0,
            address_count: 0,
            processed_addresses: 0,
            processed_transactions: 0,
        }
    }

    /// Decode a status from its JSON representation
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl Default for BlockStatus {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_backend_payload() {
        let raw = r#"{
            "blockHeight": 700000,
            "processStep": "PROCESSING_ADDRESSES",
            "processedAddresses": 3,
            "addressCount": 12
        }"#;

        let status = BlockStatus::from_json(raw).expect("valid payload");

        assert_eq!(status.block_height, 700000);
        assert_eq!(status.process_step, ProcessStep::ProcessingAddresses);
        assert_eq!(status.processed_addresses, 3);
        assert_eq!(status.address_count, 12);
        assert_eq!(status.transaction_count, 0);
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let raw = r#"{"blockHeight": 1, "processStep": "REINDEXING"}"#;
        assert!(BlockStatus::from_json(raw).is_err());
    }

    #[test]
    fn test_step_wire_name() {
        let json = serde_json::to_string(&ProcessStep::LoadingTransactions).unwrap();
        assert_eq!(json, "\"LOADING_TRANSACTIONS_FROM_BITCOIN_CORE\"");
    }

    #[test]
    fn test_idle_uses_height_sentinel() {
        let status = BlockStatus::idle();
        assert_eq!(status.block_height, BLOCK_HEIGHT_NOT_AVAILABLE);
        assert_eq!(status.process_step, ProcessStep::NoBlockToProcess);
        assert_eq!(BlockStatus::default(), status);
    }
}
