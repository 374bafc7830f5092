// Copyright (c) 2022 The zchain developers

use crossbeam_channel::Receiver;
use serde::Serialize;
use zchain_hash::Hash;
use zchain_models::LfbTicket;

/// Counters of the block fetcher
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FetchStats {
    /// fetches currently running
    pub in_flight: usize,
    /// blocks obtained from miners
    pub from_miners: u64,
    /// blocks obtained from sharders
    pub from_sharders: u64,
    /// fetches that failed on every source
    pub failed: u64,
}

/// Transaction fees of the finalized blocks
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FeeStats {
    /// mean fee over all finalized transactions
    pub mean: f64,
    /// highest fee seen
    pub max: u64,
    /// lowest fee seen
    pub min: u64,
    /// transactions counted
    pub count: u64,
}

impl FeeStats {
    /// Account for one transaction fee
    pub fn record(&mut self, fee: u64) {
        if self.count == 0 {
            self.min = fee;
        }
        self.count += 1;
        self.max = self.max.max(fee);
        self.min = self.min.min(fee);
        self.mean += (fee as f64 - self.mean) / self.count as f64;
    }
}

/// Production of one miner, indexed by the rank of its blocks
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MinerStats {
    /// notarized blocks produced at each rank
    pub generation_count_by_rank: Vec<u64>,
    /// finalized blocks produced at each rank
    pub finalization_count_by_rank: Vec<u64>,
}

impl MinerStats {
    /// One bucket per generator slot
    pub fn new(num_generators: usize) -> Self {
        MinerStats {
            generation_count_by_rank: vec![0; num_generators],
            finalization_count_by_rank: vec![0; num_generators],
        }
    }

    /// Resize the buckets after a committee change, counts are kept
    pub fn resize(&mut self, num_generators: usize) {
        self.generation_count_by_rank.resize(num_generators, 0);
        self.finalization_count_by_rank.resize(num_generators, 0);
    }
}

/// Snapshot of the chain progress
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChainStats {
    /// highest round seen
    pub current_round: u64,
    /// round of the latest finalized block
    pub lfb_round: u64,
    /// hash of the latest finalized block
    pub lfb_hash: Hash,
    /// number of the latest finalized magic block
    pub lfmb_number: u64,
    /// round of the latest block finalized by unique extensions
    pub latest_deterministic_round: u64,
    /// blocks finalized since start
    pub finalized_count: u64,
    /// rollbacks to a common ancestor
    pub rollback_count: u64,
    /// deepest rollback, in rounds
    pub longest_rollback: u64,
    /// finalizations that could not link back to the previous LFB
    pub missed_blocks: u64,
    /// finalized rounds by number of notarized blocks, the last bucket gathers the rest
    pub notarization_buckets: Vec<u64>,
    /// current round minus LFB round at the last finalization
    pub finalization_lag: u64,
    /// fees of the finalized transactions
    pub fees: FeeStats,
    /// block fetcher counters
    pub fetch: FetchStats,
}

/// Registration to the LFB tickets accepted by the node
#[derive(Debug)]
pub struct LfbTicketSubscription {
    /// used to unsubscribe
    pub id: u64,
    /// accepted tickets
    pub receiver: Receiver<LfbTicket>,
}
