// Copyright (c) 2022 The zchain developers

//! Asynchronous block fetching.
//!
//! Missing blocks are requested through two queues, one for the parents of
//! known blocks and one for blocks looked up by hash or by round. A fetch is
//! in flight at most once per key. The fetcher thread runs every request as a
//! job of its own, with a bounded number of jobs per source.

use crossbeam::channel::Receiver;
use crossbeam::select;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use zchain_channel::receiver::ZchainReceiver;
use zchain_consensus_exports::error::ConsensusError;
use zchain_models::{Block, NodeId};

use crate::chain::Chain;
use crate::commands::{FetchKey, FetchRequest, FetchSource};

impl Chain {
    /// Queue the fetch of the parent of `block`, unless it is already running
    pub(crate) fn async_fetch_previous(&self, block: &Block) {
        if block.round == 0 {
            return;
        }
        let key = FetchKey::Block(block.prev_hash);
        if !self.mark_fetching(key) {
            return;
        }
        let request = FetchRequest {
            key,
            round: block.round - 1,
            source: FetchSource::MinersThenSharders,
        };
        if self.senders.fetch_previous.try_send(request).is_err() {
            self.unmark_fetching(&key);
            debug!("fetch of the parent of block {} dropped", block.hash);
        }
    }

    /// Queue the fetch of `key`, unless it is already running
    pub(crate) fn async_fetch(&self, key: FetchKey, round: u64, source: FetchSource) {
        if let FetchKey::Block(hash) = key {
            if self.blocks.contains(&hash) {
                return;
            }
        }
        if !self.mark_fetching(key) {
            return;
        }
        let request = FetchRequest { key, round, source };
        if self.senders.fetch_by_hash.try_send(request).is_err() {
            self.unmark_fetching(&key);
            debug!("fetch of {:?} dropped", key);
        }
    }

    /// Ask the network for `key`: miners first, then sharders when the round
    /// is not above the latest LFB ticket
    pub(crate) fn fetch_block(
        &self,
        key: FetchKey,
        round: u64,
        source: FetchSource,
    ) -> Result<Block, ConsensusError> {
        let mb = self.magic_block_for_round(round)?;
        let timeout = self.config.timeout_large_message;
        let network = &self.channels.network;
        if source == FetchSource::MinersThenSharders {
            let miners: Vec<NodeId> = mb.miners.keys().copied().collect();
            let fetched = match key {
                FetchKey::Block(hash) => network.fetch_block_from_miners(&hash, round, &miners, timeout),
                FetchKey::NotarizedRound(round) => network.fetch_notarized_block(round, &miners, timeout),
            };
            match fetched {
                Ok(block) => {
                    self.counters.write().fetch.from_miners += 1;
                    return Ok(block);
                }
                Err(err) => debug!("{:?} not fetched from miners: {}", key, err),
            }
            if round > self.latest_ticket.read().round {
                self.counters.write().fetch.failed += 1;
                return Err(ConsensusError::NotFound(format!(
                    "{:?} of round {} not served by miners",
                    key, round
                )));
            }
        }
        let hash = match key {
            FetchKey::Block(hash) => hash,
            FetchKey::NotarizedRound(_) => {
                self.counters.write().fetch.failed += 1;
                return Err(ConsensusError::NotFound(format!(
                    "notarized block of round {} not served by sharders",
                    round
                )));
            }
        };
        let sharders: Vec<NodeId> = mb.sharders.keys().copied().collect();
        match network.fetch_block_from_sharders(&hash, round, &sharders, timeout) {
            Ok(block) => {
                self.counters.write().fetch.from_sharders += 1;
                Ok(block)
            }
            Err(err) => {
                self.counters.write().fetch.failed += 1;
                Err(err)
            }
        }
    }

    /// Register a block obtained for `key` and run the fetch hooks
    pub(crate) fn add_fetched_block(
        &self,
        block: Block,
        key: FetchKey,
    ) -> Result<Block, ConsensusError> {
        match key {
            FetchKey::Block(hash) if block.hash != hash => {
                return Err(ConsensusError::InvalidEntity(format!(
                    "fetched block {} instead of {}",
                    block.hash, hash
                )));
            }
            FetchKey::NotarizedRound(round) if block.round != round => {
                return Err(ConsensusError::InvalidEntity(format!(
                    "fetched block of round {} instead of {}",
                    block.round, round
                )));
            }
            _ => {}
        }
        let canonical = self.insert_block(block, false)?;
        let notarized = canonical.is_notarized();
        if let Err(err) = self.channels.after_fetcher.after_fetch(&canonical, notarized) {
            warn!("after fetch of block {} failed: {}", canonical.hash, err);
        }
        if notarized && matches!(key, FetchKey::NotarizedRound(_)) {
            self.channels
                .fetched_notarized_block_handler
                .notarized_block_fetched(&canonical);
        }
        Ok(canonical)
    }

    /// Fetch the missing ancestors down to a cached block, at most
    /// `max_fetch_depth` of them, then add them oldest first so their states
    /// are computed in order
    pub(crate) fn fetch_previous(&self, request: &FetchRequest) -> Result<(), ConsensusError> {
        let (mut hash, mut round) = match request.key {
            FetchKey::Block(hash) => (hash, request.round),
            FetchKey::NotarizedRound(_) => return self.fetch_by_key(request).map(|_| ()),
        };
        let mut fetched: Vec<Block> = Vec::new();
        while !self.blocks.contains(&hash) {
            if fetched.len() >= self.config.max_fetch_depth {
                return Err(ConsensusError::PreviousBlockUnavailable(format!(
                    "no cached ancestor within {} blocks of {:?}",
                    self.config.max_fetch_depth, request.key
                )));
            }
            let block = self.fetch_block(FetchKey::Block(hash), round, request.source)?;
            if block.hash != hash {
                return Err(ConsensusError::InvalidEntity(format!(
                    "fetched block {} instead of {}",
                    block.hash, hash
                )));
            }
            if block.round == 0 {
                return Err(ConsensusError::PreviousBlockUnavailable(format!(
                    "reached an unknown genesis {}",
                    block.hash
                )));
            }
            hash = block.prev_hash;
            round = block.round - 1;
            fetched.push(block);
        }
        let mut newest = None;
        for block in fetched.into_iter().rev() {
            let key = FetchKey::Block(block.hash);
            let canonical = self.add_fetched_block(block, key)?;
            self.compute_block_state(&canonical);
            newest = Some(canonical);
        }
        if let Some(newest) = newest {
            for child in self.blocks.blocks_at_round(newest.round + 1) {
                if child.prev_hash == newest.hash {
                    self.compute_block_state(&child);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn fetch_by_key(&self, request: &FetchRequest) -> Result<Block, ConsensusError> {
        if let FetchKey::Block(hash) = request.key {
            if let Ok(block) = self.blocks.get(&hash) {
                return Ok(block);
            }
        }
        let block = self.fetch_block(request.key, request.round, request.source)?;
        self.add_fetched_block(block, request.key)
    }
}

/// Decrements the job counter of a source when the job ends
struct JobSlot {
    chain: Arc<Chain>,
    counter: Arc<AtomicUsize>,
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        let mut counters = self.chain.counters.write();
        counters.fetch.in_flight = counters.fetch.in_flight.saturating_sub(1);
    }
}

/// Thread serving the fetch queues
pub(crate) struct BlockFetcher {
    chain: Arc<Chain>,
    fetch_previous: ZchainReceiver<FetchRequest>,
    fetch_by_hash: ZchainReceiver<FetchRequest>,
    stop: Receiver<()>,
    from_miners: Arc<AtomicUsize>,
    from_sharders: Arc<AtomicUsize>,
}

impl BlockFetcher {
    pub(crate) fn spawn(
        chain: Arc<Chain>,
        fetch_previous: ZchainReceiver<FetchRequest>,
        fetch_by_hash: ZchainReceiver<FetchRequest>,
        stop: Receiver<()>,
    ) -> Result<thread::JoinHandle<()>, ConsensusError> {
        let handle = thread::Builder::new()
            .name("block-fetcher".into())
            .spawn(move || {
                let this = BlockFetcher {
                    chain,
                    fetch_previous,
                    fetch_by_hash,
                    stop,
                    from_miners: Arc::new(AtomicUsize::new(0)),
                    from_sharders: Arc::new(AtomicUsize::new(0)),
                };
                this.run();
            })?;
        Ok(handle)
    }

    fn run(&self) {
        loop {
            select! {
                recv(self.fetch_previous) -> msg => {
                    self.fetch_previous.update_metrics();
                    match msg {
                        Ok(request) => self.dispatch(request, true),
                        Err(_) => break,
                    }
                },
                recv(self.fetch_by_hash) -> msg => {
                    self.fetch_by_hash.update_metrics();
                    match msg {
                        Ok(request) => self.dispatch(request, false),
                        Err(_) => break,
                    }
                },
                recv(self.stop) -> _ => break,
            }
        }
        info!("block fetcher stopped");
    }

    /// Run the request as a job, unless its source is saturated
    fn dispatch(&self, request: FetchRequest, previous: bool) {
        let (counter, limit) = match request.source {
            FetchSource::MinersThenSharders => (
                self.from_miners.clone(),
                self.chain.config.max_simultaneous_fetch_from_miners,
            ),
            FetchSource::Sharders => (
                self.from_sharders.clone(),
                self.chain.config.max_simultaneous_fetch_from_sharders,
            ),
        };
        if counter.fetch_add(1, Ordering::SeqCst) >= limit {
            counter.fetch_sub(1, Ordering::SeqCst);
            self.chain.unmark_fetching(&request.key);
            debug!("fetch of {:?} dropped: too many fetches running", request.key);
            return;
        }
        self.chain.counters.write().fetch.in_flight += 1;
        let slot = JobSlot {
            chain: self.chain.clone(),
            counter,
        };
        let key = request.key;
        let chain = self.chain.clone();
        let spawned = thread::Builder::new()
            .name("block-fetch-job".into())
            .spawn(move || {
                let _slot = slot;
                let result = if previous {
                    chain.fetch_previous(&request)
                } else {
                    chain.fetch_by_key(&request).map(|_| ())
                };
                chain.unmark_fetching(&request.key);
                if let Err(err) = result {
                    debug!("fetch of {:?} failed: {}", request.key, err);
                }
            });
        if let Err(err) = spawned {
            self.chain.unmark_fetching(&key);
            warn!("could not spawn a fetch job: {}", err);
        }
    }
}
