// Copyright (c) 2022 The zchain developers

use zchain_models::config::*;
use zchain_models::NodeType;
use zchain_time::ChainTime;

use crate::ChainConfig;

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            node_type: NodeType::Miner,
            threshold_by_count: THRESHOLD_BY_COUNT,
            threshold_by_stake: THRESHOLD_BY_STAKE,
            min_generators: MIN_GENERATORS,
            generators_percent: GENERATORS_PERCENT,
            view_change_offset: VIEW_CHANGE_OFFSET,
            // fast finalization in tests
            network_relay_time: ChainTime::from_millis(10),
            finalization_queue_size: FINALIZATION_QUEUE_SIZE,
            finalization_push_timeout: FINALIZATION_PUSH_TIMEOUT,
            lfb_ticket_ahead: LFB_TICKET_AHEAD,
            lfb_ticket_lag: LFB_TICKET_LAG,
            lfb_ticket_rebroadcast_timeout: LFB_TICKET_REBROADCAST_TIMEOUT,
            lfb_ticket_queue_size: LFB_TICKET_QUEUE_SIZE,
            max_fetch_depth: MAX_FETCH_DEPTH,
            fetching_cache_size: FETCHING_CACHE_SIZE,
            max_simultaneous_fetch_from_miners: MAX_SIMULTANEOUS_FETCH_FROM_MINERS,
            max_simultaneous_fetch_from_sharders: MAX_SIMULTANEOUS_FETCH_FROM_SHARDERS,
            prune_chain_depth: PRUNE_CHAIN_DEPTH,
            block_stale_age: BLOCK_STALE_AGE,
            round_retention: ROUND_RETENTION,
            dead_sibling_lookback: DEAD_SIBLING_LOOKBACK,
            chain_info_ring_size: CHAIN_INFO_RING_SIZE,
            prune_state_below_count: PRUNE_STATE_BELOW_COUNT,
            prune_version_granularity: PRUNE_VERSION_GRANULARITY,
            prune_state_period: PRUNE_STATE_PERIOD,
            state_sync_batch_size: STATE_SYNC_BATCH_SIZE,
            timeout_small_message: TIMEOUT_SMALL_MESSAGE,
            timeout_large_message: TIMEOUT_LARGE_MESSAGE,
            channel_size: CHANNEL_SIZE,
        }
    }
}
