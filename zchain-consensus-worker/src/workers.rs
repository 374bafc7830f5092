// Copyright (c) 2022 The zchain developers

//! Queue and timer driven threads of the chain engine

use crossbeam::channel::{tick, Receiver};
use crossbeam::select;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use zchain_channel::receiver::ZchainReceiver;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::ChainNetwork;
use zchain_hash::Hash;
use zchain_models::{Block, NodeId, Version};
use zchain_state::{prune_target, StateError, StateNodesFetcher, StatePruner, TrieNode};
use zchain_time::ChainTime;
use zchain_versioning::VersioningConfig;

use crate::chain::Chain;

/// Thread handing every message of `receiver` to `handler` until stopped.
/// Messages still queued at stop time are handled before exiting.
fn spawn_queue_worker<T, F>(
    name: &str,
    receiver: ZchainReceiver<T>,
    stop: Receiver<()>,
    mut handler: F,
) -> Result<thread::JoinHandle<()>, ConsensusError>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let thread_name = name.to_string();
    let handle = thread::Builder::new().name(name.into()).spawn(move || {
        loop {
            select! {
                recv(receiver) -> msg => {
                    receiver.update_metrics();
                    match msg {
                        Ok(msg) => handler(msg),
                        Err(_) => break,
                    }
                },
                recv(stop) -> _ => {
                    while let Ok(msg) = receiver.try_recv() {
                        handler(msg);
                    }
                    break;
                },
            }
        }
        info!("{} worker stopped", thread_name);
    })?;
    Ok(handle)
}

/// Thread running `handler` on every tick of `period` until stopped
fn spawn_timer_worker<F>(
    name: &str,
    period: ChainTime,
    stop: Receiver<()>,
    mut handler: F,
) -> Result<thread::JoinHandle<()>, ConsensusError>
where
    F: FnMut() + Send + 'static,
{
    let thread_name = name.to_string();
    let handle = thread::Builder::new().name(name.into()).spawn(move || {
        let ticker = tick(period.to_duration());
        loop {
            select! {
                recv(ticker) -> _ => handler(),
                recv(stop) -> _ => break,
            }
        }
        info!("{} worker stopped", thread_name);
    })?;
    Ok(handle)
}

pub(crate) fn start_finalize_round_worker(
    chain: Arc<Chain>,
    receiver: ZchainReceiver<u64>,
    stop: Receiver<()>,
) -> Result<thread::JoinHandle<()>, ConsensusError> {
    spawn_queue_worker("finalize-round", receiver, stop, move |round| {
        if let Err(err) = chain.finalize_round(round) {
            warn!("finalization of round {} aborted: {}", round, err);
        }
    })
}

pub(crate) fn start_finalize_block_worker(
    chain: Arc<Chain>,
    receiver: ZchainReceiver<Block>,
    stop: Receiver<()>,
) -> Result<thread::JoinHandle<()>, ConsensusError> {
    spawn_queue_worker("finalize-block", receiver, stop, move |block: Block| {
        let (hash, round) = (block.hash, block.round);
        if let Err(err) = chain.finalize_block(block) {
            warn!("finalization of block {} of round {} failed: {}", hash, round, err);
        }
    })
}

/// Fills the holes of the local trie from the sharders
struct NetworkStateFetcher {
    network: Arc<dyn ChainNetwork>,
    sharders: Vec<NodeId>,
    timeout: ChainTime,
}

impl StateNodesFetcher for NetworkStateFetcher {
    fn get_state_nodes(&self, keys: &[Hash]) -> Result<Vec<(Hash, TrieNode)>, StateError> {
        self.network
            .get_state_nodes(keys, &self.sharders, self.timeout)
            .map_err(|err| {
                debug!("state nodes not fetched: {}", err);
                StateError::PendingSync(keys.len())
            })
    }
}

impl Chain {
    /// Prune the state versions no retained finalized block needs. Returns
    /// the version pruned at.
    pub(crate) fn prune_state(&self, last_pruned: u64) -> Option<u64> {
        let summaries = self.finalized_summaries();
        let (version, root) = prune_target(
            &summaries,
            self.config.prune_state_below_count,
            self.config.prune_version_granularity,
        )?;
        if version <= last_pruned {
            return None;
        }
        let fetcher = NetworkStateFetcher {
            network: self.channels.network.clone(),
            sharders: self.current_sharders(),
            timeout: self.config.timeout_large_message,
        };
        let pruner = StatePruner::new(
            self.channels.state.state_db(),
            Some(Arc::new(fetcher)),
            self.config.state_sync_batch_size,
        );
        match pruner.prune(root, version) {
            Ok(stats) => {
                debug!(
                    "state pruned at version {}: {} nodes deleted",
                    version, stats.deleted_nodes
                );
                Some(version)
            }
            Err(StateError::PendingSync(missing)) => {
                info!(
                    "state pruning at version {} waits for {} missing nodes",
                    version, missing
                );
                None
            }
            Err(err) => {
                warn!("state pruning at version {} failed: {}", version, err);
                None
            }
        }
    }

    /// Announce our version to the committee and count it ourselves
    pub(crate) fn announce_version(&self, version: Version) {
        let nodes: Vec<NodeId> = self
            .current_members()
            .into_iter()
            .filter(|id| *id != self.self_id)
            .collect();
        self.channels
            .network
            .send_version(version, &nodes, self.config.timeout_small_message);
        if let Err(err) = self.versions.add(self.self_id, version) {
            debug!("own version not counted: {}", err);
        }
    }
}

pub(crate) fn start_prune_state_worker(
    chain: Arc<Chain>,
    stop: Receiver<()>,
) -> Result<thread::JoinHandle<()>, ConsensusError> {
    let period = chain.config.prune_state_period;
    let mut last_pruned = 0;
    spawn_timer_worker("prune-state", period, stop, move || {
        if let Some(version) = chain.prune_state(last_pruned) {
            last_pruned = version;
        }
    })
}

pub(crate) fn start_versions_worker(
    chain: Arc<Chain>,
    config: VersioningConfig,
    stop: Receiver<()>,
) -> Result<thread::JoinHandle<()>, ConsensusError> {
    let mut adopted = chain.versions.get_consensus_version();
    spawn_timer_worker("versions", config.broadcast_period, stop, move || {
        chain.announce_version(config.node_version);
        let current = chain.versions.get_consensus_version();
        if current != adopted {
            match current {
                Some(version) => info!("committee adopted version {}", version),
                None => info!("committee lost its agreed version"),
            }
            adopted = current;
        }
    })
}
