// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use zchain_hash::Hash;
use zchain_time::ChainTime;

/// Snapshot of the chain progress, recorded each time a block is finalized
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// when the block was finalized
    pub timestamp: ChainTime,
    /// round of the finalized block
    pub finalized_round: u64,
    /// number of blocks finalized so far
    pub finalized_count: u64,
    /// hash of the finalized block
    pub block_hash: Hash,
    /// state root after the block
    pub client_state_hash: Hash,
    /// rounds skipped by finalization so far
    pub missed_blocks: u64,
    /// rollbacks so far
    pub rollback_count: u64,
}
