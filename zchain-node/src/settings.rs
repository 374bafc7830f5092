// Copyright (c) 2022 The zchain developers

//! Build here the node settings from the configuration file toml, and the
//! worker configurations from the settings
use serde::Deserialize;
use std::path::PathBuf;
use zchain_consensus_exports::ChainConfig;
use zchain_models::config::*;
use zchain_models::NodeType;
use zchain_state::StateConfig;
use zchain_time::ChainTime;
use zchain_versioning::VersioningConfig;

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LoggingSettings {
    pub level: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeSettings {
    pub node_type: NodeType,
    pub keypair: Option<String>,
    pub lfb_record_path: PathBuf,
    pub stats_period: ChainTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenesisBalance {
    pub client: String,
    pub balance: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenesisSettings {
    pub miners: Vec<String>,
    pub sharders: Vec<String>,
    pub balances: Vec<GenesisBalance>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ConsensusSettings {
    pub threshold_by_count: u64,
    pub threshold_by_stake: u64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BlockSettings {
    pub generators: usize,
    pub generators_percent: f64,
    pub consensus: ConsensusSettings,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SmartContractSettings {
    pub timeout: ChainTime,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct StateSettings {
    pub prune_below_count: usize,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LfbTicketSettings {
    pub rebroadcast_timeout: ChainTime,
    pub ahead: u64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct NetworkSettings {
    pub relay_time: ChainTime,
    pub timeout_small_message: ChainTime,
    pub timeout_large_message: ChainTime,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BlocksFetchingSettings {
    pub max_simultaneous_from_miners: usize,
    pub max_simultaneous_from_sharders: usize,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct VersionsSettings {
    pub threshold_percent: u64,
    pub broadcast_period: ChainTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerChainSettings {
    pub view_change_offset: u64,
    pub fees_enabled: bool,
    pub dead_sibling_lookback: u64,
    pub block: BlockSettings,
    pub smart_contract: SmartContractSettings,
    pub state: StateSettings,
    pub lfb_ticket: LfbTicketSettings,
    pub network: NetworkSettings,
    pub async_blocks_fetching: BlocksFetchingSettings,
    pub versions: VersionsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub node: NodeSettings,
    pub genesis: GenesisSettings,
    pub server_chain: ServerChainSettings,
}

impl Settings {
    pub fn chain_config(&self, node_type: NodeType) -> ChainConfig {
        let chain = &self.server_chain;
        ChainConfig {
            node_type,
            threshold_by_count: chain.block.consensus.threshold_by_count,
            threshold_by_stake: chain.block.consensus.threshold_by_stake,
            min_generators: chain.block.generators,
            generators_percent: chain.block.generators_percent,
            view_change_offset: chain.view_change_offset,
            network_relay_time: chain.network.relay_time,
            finalization_queue_size: FINALIZATION_QUEUE_SIZE,
            finalization_push_timeout: FINALIZATION_PUSH_TIMEOUT,
            lfb_ticket_ahead: chain.lfb_ticket.ahead,
            lfb_ticket_lag: LFB_TICKET_LAG,
            lfb_ticket_rebroadcast_timeout: chain.lfb_ticket.rebroadcast_timeout,
            lfb_ticket_queue_size: LFB_TICKET_QUEUE_SIZE,
            max_fetch_depth: MAX_FETCH_DEPTH,
            fetching_cache_size: FETCHING_CACHE_SIZE,
            max_simultaneous_fetch_from_miners: chain
                .async_blocks_fetching
                .max_simultaneous_from_miners,
            max_simultaneous_fetch_from_sharders: chain
                .async_blocks_fetching
                .max_simultaneous_from_sharders,
            prune_chain_depth: PRUNE_CHAIN_DEPTH,
            block_stale_age: BLOCK_STALE_AGE,
            round_retention: ROUND_RETENTION,
            dead_sibling_lookback: chain.dead_sibling_lookback,
            chain_info_ring_size: CHAIN_INFO_RING_SIZE,
            prune_state_below_count: chain.state.prune_below_count,
            prune_version_granularity: PRUNE_VERSION_GRANULARITY,
            prune_state_period: PRUNE_STATE_PERIOD,
            state_sync_batch_size: STATE_SYNC_BATCH_SIZE,
            timeout_small_message: chain.network.timeout_small_message,
            timeout_large_message: chain.network.timeout_large_message,
            channel_size: CHANNEL_SIZE,
        }
    }

    pub fn state_config(&self) -> StateConfig {
        StateConfig {
            smart_contract_timeout: self.server_chain.smart_contract.timeout,
            fees_enabled: self.server_chain.fees_enabled,
            miners_sc_address: *MINERS_SC_ADDRESS,
            approved_minters: APPROVED_MINTERS.clone(),
            sync_batch_size: STATE_SYNC_BATCH_SIZE,
        }
    }

    pub fn versioning_config(&self) -> VersioningConfig {
        VersioningConfig {
            threshold_percent: self.server_chain.versions.threshold_percent,
            broadcast_period: self.server_chain.versions.broadcast_period,
            node_version: *NODE_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn load(path: &std::path::Path) -> Settings {
        std::env::set_var("ZCHAIN_CONFIG_PATH", path);
        let settings = build_zchain_settings("zchain-node-test", "ZCHAINNODETEST");
        std::env::remove_var("ZCHAIN_CONFIG_PATH");
        settings.unwrap()
    }

    #[test]
    #[serial]
    fn test_load_base_config() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("base_config/config.toml");
        let settings = load(&path);
        assert_eq!(settings.node.node_type, NodeType::Miner);
        assert!(settings.node.keypair.is_none());
        assert!(settings.genesis.miners.is_empty());

        let config = settings.chain_config(NodeType::Sharder);
        assert_eq!(config.node_type, NodeType::Sharder);
        assert_eq!(config.threshold_by_count, THRESHOLD_BY_COUNT);
        assert_eq!(config.view_change_offset, VIEW_CHANGE_OFFSET);
        assert_eq!(config.network_relay_time, NETWORK_RELAY_TIME);
        assert_eq!(config.lfb_ticket_ahead, LFB_TICKET_AHEAD);
        assert_eq!(
            config.lfb_ticket_rebroadcast_timeout,
            LFB_TICKET_REBROADCAST_TIMEOUT
        );
        assert_eq!(config.dead_sibling_lookback, DEAD_SIBLING_LOOKBACK);
        assert_eq!(
            settings.state_config().smart_contract_timeout,
            SMART_CONTRACT_TIMEOUT
        );
        let versioning = settings.versioning_config();
        assert_eq!(versioning.threshold_percent, VERSIONS_THRESHOLD_PERCENT);
        assert_eq!(versioning.broadcast_period, VERSION_BROADCAST_PERIOD);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("base_config/config.toml");
        std::env::set_var("ZCHAINNODETEST_SERVER_CHAIN__VIEW_CHANGE_OFFSET", "6");
        let settings = load(&path);
        std::env::remove_var("ZCHAINNODETEST_SERVER_CHAIN__VIEW_CHANGE_OFFSET");
        assert_eq!(settings.chain_config(NodeType::Miner).view_change_offset, 6);
    }
}
