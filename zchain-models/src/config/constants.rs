//! DEFAULT VALUES USED TO INITIALIZE THE WORKER CONFIGURATIONS
//!
//! These are the values the node falls back to when the settings file does
//! not override them, and the protocol constants nobody should override.
use zchain_hash::Hash;
use zchain_time::ChainTime;

use crate::{ClientId, Version};

/// Rounds between the start of a magic block and its adoption
pub const VIEW_CHANGE_OFFSET: u64 = 4;
/// Network relay time, `Δ`
pub const NETWORK_RELAY_TIME: ChainTime = ChainTime::from_millis(200);
/// Capacity of the finalize-round and finalize-block queues
pub const FINALIZATION_QUEUE_SIZE: usize = 128;
/// Maximum wait when pushing onto a finalization queue
pub const FINALIZATION_PUSH_TIMEOUT: ChainTime = ChainTime::from_millis(500);
/// Rounds the LFB may lag behind the current round before the node is syncing
pub const LFB_TICKET_AHEAD: u64 = 2;
/// Rounds the LFB may lag behind the latest ticket before the node is syncing
pub const LFB_TICKET_LAG: u64 = 3;
/// Period of the sharders' LFB ticket re-broadcast
pub const LFB_TICKET_REBROADCAST_TIMEOUT: ChainTime = ChainTime::from_millis(16_000);
/// Capacity of the LFB ticket engine input queues
pub const LFB_TICKET_QUEUE_SIZE: usize = 100;
/// Maximum number of hops walked back when fetching previous blocks
pub const MAX_FETCH_DEPTH: usize = 10;
/// Number of in-flight fetches remembered
pub const FETCHING_CACHE_SIZE: u32 = 100;
/// Parallel fetches from miners
pub const MAX_SIMULTANEOUS_FETCH_FROM_MINERS: usize = 100;
/// Parallel fetches from sharders
pub const MAX_SIMULTANEOUS_FETCH_FROM_SHARDERS: usize = 30;
/// Depth below the oldest finalized block under which blocks are pruned
pub const PRUNE_CHAIN_DEPTH: u64 = 50;
/// Age after which an unused block may be pruned
pub const BLOCK_STALE_AGE: ChainTime = ChainTime::from_millis(60_000);
/// Rounds kept below the current round
pub const ROUND_RETENTION: u64 = 10;
/// Depth at which dead siblings of a finalized block are dropped
pub const DEAD_SIBLING_LOOKBACK: u64 = 10;
/// Length of the finalized block ring
pub const CHAIN_INFO_RING_SIZE: usize = 10_000;
/// Batch of missing state nodes fetched at once while pruning
pub const STATE_SYNC_BATCH_SIZE: usize = 1000;
/// Pruned versions are rounded down to a multiple of this
pub const PRUNE_VERSION_GRANULARITY: u64 = 100;
/// Finalized blocks kept below the pruned version
pub const PRUNE_STATE_BELOW_COUNT: usize = 100;
/// Period of the state pruner
pub const PRUNE_STATE_PERIOD: ChainTime = ChainTime::from_millis(60_000);
/// Smart-contract execution timeout
pub const SMART_CONTRACT_TIMEOUT: ChainTime = ChainTime::from_millis(8_000);
/// Timeout of small messages (LFB tickets)
pub const TIMEOUT_SMALL_MESSAGE: ChainTime = ChainTime::from_millis(1_000);
/// Timeout of large messages (blocks, state)
pub const TIMEOUT_LARGE_MESSAGE: ChainTime = ChainTime::from_millis(10_000);
/// Notarization threshold by ticket count, in percent of the miners
pub const THRESHOLD_BY_COUNT: u64 = 67;
/// Notarization threshold by stake, 0 disables it
pub const THRESHOLD_BY_STAKE: u64 = 0;
/// Generators per round, lower bound
pub const MIN_GENERATORS: usize = 2;
/// Generators per round, share of the miners
pub const GENERATORS_PERCENT: f64 = 0.2;
/// Agreement needed to adopt a version, in percent of the committee
pub const VERSIONS_THRESHOLD_PERCENT: u64 = 80;
/// Period of the version announcements
pub const VERSION_BROADCAST_PERIOD: ChainTime = ChainTime::from_millis(30_000);
/// Channel size of the worker commands
pub const CHANNEL_SIZE: usize = 1024;

lazy_static! {
    /// Smart contract receiving transaction fees
    pub static ref MINERS_SC_ADDRESS: ClientId = ClientId::from_label("miner_sc");
    /// Smart contracts allowed to mint
    pub static ref APPROVED_MINTERS: Vec<ClientId> = vec![
        ClientId::from_label("miner_sc"),
        ClientId::from_label("interest_pool_sc"),
        ClientId::from_label("storage_sc"),
    ];
    /// Fixed key of the persisted latest finalized block record
    pub static ref LFB_ROUND_KEY: Hash = Hash::compute_from(b"latest_finalized_block_round");
    /// Software version announced by this build
    pub static ref NODE_VERSION: Version = Version::new(1, 0, 0);
}
