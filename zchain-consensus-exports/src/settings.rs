// Copyright (c) 2022 The zchain developers

use zchain_models::NodeType;
use zchain_time::ChainTime;

/// Runtime configuration of the chain engine
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// role of this node in the committee
    pub node_type: NodeType,
    /// percent of the miners whose tickets notarize a block, 0 disables the check
    pub threshold_by_count: u64,
    /// stake the tickets of a block must gather, 0 disables the check
    pub threshold_by_stake: u64,
    /// lower bound on the generators of a round
    pub min_generators: usize,
    /// share of the miners generating in a round
    pub generators_percent: f64,
    /// rounds between a magic block finalization and its activation
    pub view_change_offset: u64,
    /// time for a message to cross the network, finalization waits twice that
    pub network_relay_time: ChainTime,
    /// capacity of the finalize-round and finalize-block queues
    pub finalization_queue_size: usize,
    /// how long a finalize-round push may block before the round is dropped
    pub finalization_push_timeout: ChainTime,
    /// how many rounds the LFB may lag behind the current round
    pub lfb_ticket_ahead: u64,
    /// how many rounds the LFB may lag behind the latest ticket before the node is syncing
    pub lfb_ticket_lag: u64,
    /// period between two re-broadcasts of our own LFB ticket
    pub lfb_ticket_rebroadcast_timeout: ChainTime,
    /// capacity of the LFB ticket input queues
    pub lfb_ticket_queue_size: usize,
    /// hops walked back when fetching missing previous blocks
    pub max_fetch_depth: usize,
    /// in-flight fetches remembered
    pub fetching_cache_size: u32,
    /// concurrent fetches from miners
    pub max_simultaneous_fetch_from_miners: usize,
    /// concurrent fetches from sharders
    pub max_simultaneous_fetch_from_sharders: usize,
    /// rounds kept below the oldest finalized block before blocks are pruned
    pub prune_chain_depth: u64,
    /// age after which an old block may be pruned
    pub block_stale_age: ChainTime,
    /// rounds kept below the current round
    pub round_retention: u64,
    /// depth at which dead siblings of a finalized block are removed
    pub dead_sibling_lookback: u64,
    /// finalized chain info entries kept
    pub chain_info_ring_size: usize,
    /// finalized blocks the state pruner keeps intact
    pub prune_state_below_count: usize,
    /// state versions are pruned at multiples of this round
    pub prune_version_granularity: u64,
    /// period of the state pruner
    pub prune_state_period: ChainTime,
    /// trie nodes fetched per request while syncing
    pub state_sync_batch_size: usize,
    /// timeout of small messages such as LFB tickets
    pub timeout_small_message: ChainTime,
    /// timeout of large messages such as blocks
    pub timeout_large_message: ChainTime,
    /// capacity of the worker input channels
    pub channel_size: usize,
}

impl ChainConfig {
    /// Time waited before a round is handed to the finalizer
    pub fn finalization_time(&self) -> ChainTime {
        self.network_relay_time.saturating_add(self.network_relay_time)
    }
}
