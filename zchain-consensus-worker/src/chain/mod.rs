// Copyright (c) 2022 The zchain developers

//! The chain handle shared by the controller and every worker thread.
//!
//! It owns the block cache, the round table and the magic block store, the
//! latest finalized and latest deterministic blocks, and the senders of the
//! worker queues. Protocol operations are split by concern across the
//! submodules.

mod finalization;
mod notarization;
mod sync;
mod view_change;

use parking_lot::{Mutex, RwLock};
use schnellru::{ByLength, LruMap};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use zchain_channel::receiver::ZchainReceiver;
use zchain_channel::sender::ZchainSender;
use zchain_channel::ZchainChannel;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::{
    ChainChannels, ChainConfig, ChainStats, FeeStats, FetchStats, MinerStats,
};
use zchain_hash::Hash;
use zchain_models::{
    Block, BlockSummary, ChainInfo, LfbRoundRecord, LfbTicket, MagicBlock, Node, NodeId,
    StateStatus,
};
use zchain_signature::KeyPair;
use zchain_versioning::{VersioningConfig, VersionsConsensus};

use crate::block_cache::BlockCache;
use crate::commands::{FetchKey, FetchRequest, LfbTicketCommand};
use crate::magic_block_store::MagicBlockStore;
use crate::round_table::RoundTable;

/// Producer side of the worker queues
#[derive(Clone)]
pub(crate) struct ChainSenders {
    pub finalize_round: ZchainSender<u64>,
    pub finalize_block: ZchainSender<Block>,
    pub fetch_previous: ZchainSender<FetchRequest>,
    pub fetch_by_hash: ZchainSender<FetchRequest>,
    pub lfb_ticket_update: ZchainSender<LfbTicket>,
    pub lfb_ticket_broadcast: ZchainSender<Block>,
    pub lfb_ticket_command: ZchainSender<LfbTicketCommand>,
}

/// Consumer side of the worker queues, split between the threads at start
pub(crate) struct ChainReceivers {
    pub finalize_round: ZchainReceiver<u64>,
    pub finalize_block: ZchainReceiver<Block>,
    pub fetch_previous: ZchainReceiver<FetchRequest>,
    pub fetch_by_hash: ZchainReceiver<FetchRequest>,
    pub lfb_ticket_update: ZchainReceiver<LfbTicket>,
    pub lfb_ticket_broadcast: ZchainReceiver<Block>,
    pub lfb_ticket_command: ZchainReceiver<LfbTicketCommand>,
}

fn channel<T>(
    name: &str,
    capacity: usize,
) -> Result<(ZchainSender<T>, ZchainReceiver<T>), ConsensusError> {
    ZchainChannel::new(name.to_string(), Some(capacity))
        .map_err(|err| ConsensusError::ChannelError(format!("{}: {}", name, err)))
}

/// Create the worker queues
pub(crate) fn create_channels(
    config: &ChainConfig,
) -> Result<(ChainSenders, ChainReceivers), ConsensusError> {
    let (finalize_round_tx, finalize_round_rx) =
        channel("chain_finalize_round", config.finalization_queue_size)?;
    let (finalize_block_tx, finalize_block_rx) =
        channel("chain_finalize_block", config.finalization_queue_size)?;
    let (fetch_previous_tx, fetch_previous_rx) =
        channel("chain_fetch_previous", config.channel_size)?;
    let (fetch_by_hash_tx, fetch_by_hash_rx) = channel("chain_fetch_by_hash", config.channel_size)?;
    let (ticket_update_tx, ticket_update_rx) =
        channel("chain_lfb_ticket_update", config.lfb_ticket_queue_size)?;
    let (ticket_broadcast_tx, ticket_broadcast_rx) =
        channel("chain_lfb_ticket_broadcast", config.lfb_ticket_queue_size)?;
    let (ticket_command_tx, ticket_command_rx) =
        channel("chain_lfb_ticket_command", config.channel_size)?;
    Ok((
        ChainSenders {
            finalize_round: finalize_round_tx,
            finalize_block: finalize_block_tx,
            fetch_previous: fetch_previous_tx,
            fetch_by_hash: fetch_by_hash_tx,
            lfb_ticket_update: ticket_update_tx,
            lfb_ticket_broadcast: ticket_broadcast_tx,
            lfb_ticket_command: ticket_command_tx,
        },
        ChainReceivers {
            finalize_round: finalize_round_rx,
            finalize_block: finalize_block_rx,
            fetch_previous: fetch_previous_rx,
            fetch_by_hash: fetch_by_hash_rx,
            lfb_ticket_update: ticket_update_rx,
            lfb_ticket_broadcast: ticket_broadcast_rx,
            lfb_ticket_command: ticket_command_rx,
        },
    ))
}

pub(crate) struct ChainHead {
    pub lfb: Block,
    pub latest_deterministic: Block,
    pub lfb_record: LfbRoundRecord,
}

#[derive(Default)]
pub(crate) struct ChainCounters {
    pub finalized_count: u64,
    pub rollback_count: u64,
    pub longest_rollback: u64,
    pub missed_blocks: u64,
    pub finalization_lag: u64,
    pub notarization_buckets: Vec<u64>,
    pub fees: FeeStats,
    pub fetch: FetchStats,
    pub miner_stats: BTreeMap<NodeId, MinerStats>,
    pub chain_info: VecDeque<ChainInfo>,
    pub summaries: VecDeque<BlockSummary>,
}

pub(crate) struct Chain {
    pub config: ChainConfig,
    keypair: KeyPair,
    pub self_id: NodeId,
    pub blocks: BlockCache,
    pub rounds: RoundTable,
    pub magic_blocks: MagicBlockStore,
    pub channels: ChainChannels,
    pub versions: VersionsConsensus,
    pub head: RwLock<ChainHead>,
    pub counters: RwLock<ChainCounters>,
    nodes: RwLock<BTreeMap<NodeId, Node>>,
    pub fetching: Mutex<LruMap<FetchKey, ()>>,
    pub latest_ticket: RwLock<LfbTicket>,
    pub senders: ChainSenders,
    next_subscription_id: AtomicU64,
}

impl Chain {
    /// Chain rooted at `genesis`, which must embed the first magic block and
    /// whose state root must already be in the state DB
    pub fn new(
        config: ChainConfig,
        versioning_config: &VersioningConfig,
        channels: ChainChannels,
        keypair: KeyPair,
        mut genesis: Block,
        senders: ChainSenders,
    ) -> Result<Self, ConsensusError> {
        let magic_block = genesis.magic_block.clone().ok_or_else(|| {
            ConsensusError::InvalidEntity("genesis block without magic block".to_string())
        })?;
        magic_block.check()?;
        let self_id = NodeId::from_public_key(&keypair.get_public_key());
        genesis.state_status = StateStatus::Success;
        genesis.set_notarized();

        let versions = VersionsConsensus::new(versioning_config, magic_block.all_node_ids());
        let lfb_record = LfbRoundRecord {
            round: genesis.round,
            hash: genesis.hash,
            magic_block_number: magic_block.magic_block_number,
        };
        let chain = Chain {
            magic_blocks: MagicBlockStore::new(config.view_change_offset),
            fetching: Mutex::new(LruMap::new(ByLength::new(config.fetching_cache_size))),
            config,
            keypair,
            self_id,
            blocks: BlockCache::default(),
            rounds: RoundTable::default(),
            channels,
            versions,
            head: RwLock::new(ChainHead {
                lfb: genesis.clone(),
                latest_deterministic: genesis.clone(),
                lfb_record,
            }),
            counters: RwLock::new(ChainCounters::default()),
            nodes: RwLock::new(BTreeMap::new()),
            latest_ticket: RwLock::new(LfbTicket::unsigned(genesis.round, genesis.hash)),
            senders,
            next_subscription_id: AtomicU64::new(0),
        };

        chain.magic_blocks.put(magic_block.clone(), &chain.self_id)?;
        chain.magic_blocks.set_lfmb(magic_block.clone());
        chain.update_nodes_from_magic_block(&magic_block);
        if !chain.channels.state.has_state(&genesis.hash) {
            chain.channels.state.install_state(&genesis)?;
        }
        chain.rounds.with_round(genesis.round, |round| round.set_finalized());
        chain.blocks.add(genesis);
        Ok(chain)
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn lfb(&self) -> Block {
        self.head.read().lfb.clone()
    }

    pub fn latest_deterministic_block(&self) -> Block {
        self.head.read().latest_deterministic.clone()
    }

    /// Magic block governing `round`
    pub fn magic_block_for_round(&self, round: u64) -> Result<Arc<MagicBlock>, ConsensusError> {
        self.magic_blocks
            .get(round)
            .ok_or_else(|| ConsensusError::NotFound(format!("magic block for round {}", round)))
    }

    pub fn num_generators(&self, round: u64) -> usize {
        self.magic_blocks.get(round).map_or(0, |mb| {
            mb.num_generators(self.config.min_generators, self.config.generators_percent)
        })
    }

    /// Set the random seed of `round`, ranks follow the committee of the round
    pub fn set_random_seed(&self, round: u64, seed: u64) -> bool {
        let miners_count = self.magic_blocks.get(round).map_or(0, |mb| mb.miners.size());
        self.rounds.set_random_seed(round, seed, miners_count)
    }

    /// Heaviest notarized block of `round`
    pub fn get_notarized_block(&self, round: u64) -> Result<Block, ConsensusError> {
        let hash = self
            .rounds
            .get_round(round)
            .and_then(|r| r.heaviest_notarized_block())
            .ok_or_else(|| {
                ConsensusError::NotFound(format!("notarized block of round {}", round))
            })?;
        self.blocks.get(&hash)
    }

    pub fn next_subscription_id(&self) -> u64 {
        self.next_subscription_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn known_nodes(&self) -> Vec<NodeId> {
        self.nodes.read().keys().copied().collect()
    }

    /// Register a block seen on the network or produced locally, returns the
    /// canonical instance
    pub fn add_block(&self, block: Block) -> Result<Block, ConsensusError> {
        self.insert_block(block, false)
    }

    /// `tickets_verified`: the block tickets were checked by the caller.
    /// Otherwise the tickets that fail verification are dropped before the
    /// block reaches the cache.
    pub(crate) fn insert_block(
        &self,
        mut block: Block,
        tickets_verified: bool,
    ) -> Result<Block, ConsensusError> {
        if block.hash != block.compute_hash() {
            return Err(ConsensusError::InvalidEntity(format!(
                "block {} of round {} hash mismatch",
                block.hash, block.round
            )));
        }
        if !tickets_verified {
            let rejected: Vec<NodeId> = block
                .verification_tickets()
                .iter()
                .filter_map(|ticket| match self.verify_ticket(&block, ticket) {
                    Ok(()) => None,
                    Err(err) => {
                        warn!("dropping verification ticket: {}", err);
                        Some(ticket.verifier_id)
                    }
                })
                .collect();
            if !rejected.is_empty() {
                block.retain_verification_tickets(|ticket| {
                    !rejected.contains(&ticket.verifier_id)
                });
            }
        }
        let hash = block.hash;
        let known = self.blocks.contains(&hash);
        let canonical = self.blocks.add(block);
        if !known {
            debug!("block {} of round {} added", hash, canonical.round);
            self.rounds
                .with_round(canonical.round, |round| round.add_proposed_block(hash));
            if canonical.round > 0 && !self.blocks.contains(&canonical.prev_hash) {
                self.async_fetch_previous(&canonical);
            } else {
                self.compute_block_state(&canonical);
            }
        }
        if !canonical.is_notarized() && canonical.verification_tickets_count() > 0 {
            if let Err(err) = self.notarize_if_reached(&hash) {
                warn!("block {} notarization check failed: {}", hash, err);
            }
        }
        self.blocks.get(&hash)
    }

    /// Compute the state of a cached block once its parent state is known.
    /// The outcome is recorded in the cached block.
    pub(crate) fn compute_block_state(&self, block: &Block) {
        if block.state_status.is_computed() || !self.channels.state.has_state(&block.prev_hash) {
            return;
        }
        let status = match self.channels.state.compute_state(block) {
            Ok(()) => StateStatus::Success,
            Err(err) => {
                warn!(
                    "state of block {} of round {} not computed: {}",
                    block.hash, block.round, err
                );
                StateStatus::Failed
            }
        };
        let _ = self.blocks.update(&block.hash, |cached| {
            cached.state_status = status;
        });
    }

    /// Mark a fetch in flight, returns false if it already was
    pub(crate) fn mark_fetching(&self, key: FetchKey) -> bool {
        let mut fetching = self.fetching.lock();
        if fetching.peek(&key).is_some() {
            return false;
        }
        fetching.insert(key, ());
        true
    }

    pub(crate) fn unmark_fetching(&self, key: &FetchKey) {
        self.fetching.lock().remove(key);
    }

    pub(crate) fn is_fetching(&self, key: &FetchKey) -> bool {
        self.fetching.lock().peek(key).is_some()
    }

    pub fn get_stats(&self) -> ChainStats {
        let (lfb_round, lfb_hash, deterministic_round) = {
            let head = self.head.read();
            (head.lfb.round, head.lfb.hash, head.latest_deterministic.round)
        };
        let counters = self.counters.read();
        ChainStats {
            current_round: self.rounds.current_round(),
            lfb_round,
            lfb_hash,
            lfmb_number: self
                .magic_blocks
                .lfmb()
                .map_or(0, |mb| mb.magic_block_number),
            latest_deterministic_round: deterministic_round,
            finalized_count: counters.finalized_count,
            rollback_count: counters.rollback_count,
            longest_rollback: counters.longest_rollback,
            missed_blocks: counters.missed_blocks,
            notarization_buckets: counters.notarization_buckets.clone(),
            finalization_lag: counters.finalization_lag,
            fees: counters.fees.clone(),
            fetch: counters.fetch.clone(),
        }
    }

    pub fn miner_stats(&self, miner_id: &NodeId) -> Option<MinerStats> {
        self.counters.read().miner_stats.get(miner_id).cloned()
    }

    pub fn get_chain_info(&self) -> Vec<ChainInfo> {
        self.counters.read().chain_info.iter().cloned().collect()
    }

    /// Finalized block summaries, oldest first
    pub fn finalized_summaries(&self) -> Vec<BlockSummary> {
        self.counters.read().summaries.iter().cloned().collect()
    }

    pub fn lfb_record(&self) -> LfbRoundRecord {
        self.head.read().lfb_record
    }

    pub fn get_state_nodes(&self, keys: &[Hash]) -> Vec<(Hash, zchain_state::TrieNode)> {
        let db = self.channels.state.state_db();
        keys.iter()
            .filter_map(|key| db.get_node(key).ok().map(|node| (*key, node)))
            .collect()
    }
}
