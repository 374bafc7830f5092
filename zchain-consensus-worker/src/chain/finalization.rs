// Copyright (c) 2022 The zchain developers

use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use zchain_consensus_exports::error::ConsensusError;
use zchain_models::{Block, ChainInfo, LfbRoundRecord, NodeType};
use zchain_time::ChainTime;

use super::Chain;
use crate::commands::{FetchKey, FetchSource};

impl Chain {
    /// Hand `round` to the finalizer once the finalization time elapsed.
    /// A round is handed over at most once.
    pub fn request_round_finalization(self: &Arc<Self>, round: u64) {
        let (proceed, has_notarized) = self.rounds.with_round(round, |r| {
            (
                !r.is_finalized() && r.set_finalizing(),
                r.has_notarized_blocks(),
            )
        });
        if !proceed {
            return;
        }
        if !has_notarized {
            self.async_fetch(
                FetchKey::NotarizedRound(round),
                round,
                FetchSource::MinersThenSharders,
            );
        }
        let sender = self.senders.finalize_round.clone();
        let delay = self.config.finalization_time().to_duration();
        let push_timeout = self.config.finalization_push_timeout.to_duration();
        let spawned = thread::Builder::new()
            .name("finalize-round-delay".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if sender.send_timeout(round, push_timeout).is_err() {
                    warn!("finalize round {} dropped: finalization queue full", round);
                }
            });
        if let Err(err) = spawned {
            warn!("could not delay finalization of round {}: {}", round, err);
        }
    }

    /// Single common ancestor of the notarized blocks of `round`, or of the
    /// closest lower round having some. `None` if the tips do not converge
    /// above the LFB or a predecessor is missing.
    pub fn compute_finalized_block(&self, round: u64) -> Option<Block> {
        let lfb_round = self.head.read().lfb.round;
        let mut r = round;
        let notarized = loop {
            if r <= lfb_round {
                return None;
            }
            let hashes: Vec<_> = self
                .rounds
                .get_round(r)
                .map(|rd| rd.notarized_blocks().iter().map(|e| e.hash).collect())
                .unwrap_or_default();
            if !hashes.is_empty() {
                break hashes;
            }
            r -= 1;
        };
        let mut tips: Vec<Block> = notarized
            .iter()
            .filter_map(|hash| self.blocks.get(hash).ok())
            .collect();
        if tips.is_empty() {
            return None;
        }
        loop {
            let mut next: Vec<Block> = Vec::with_capacity(1);
            for tip in &tips {
                if tip.round == 0 {
                    // forks down to genesis never converge
                    return None;
                }
                if next.iter().any(|b| b.hash == tip.prev_hash) {
                    continue;
                }
                match self.blocks.get(&tip.prev_hash) {
                    Ok(prev) => next.push(prev),
                    Err(_) => {
                        self.async_fetch_previous(tip);
                        return None;
                    }
                }
            }
            tips = next;
            if tips.len() == 1 {
                break;
            }
        }
        let fb = tips.pop()?;
        if fb.round >= r {
            return None;
        }
        Some(fb)
    }

    /// Finalize the chain up to the common ancestor of the notarized blocks
    /// of `round`, or roll back to the common ancestor of the current LFB and
    /// that block when it sits on another fork
    pub fn finalize_round(&self, round: u64) -> Result<(), ConsensusError> {
        self.tally_notarizations(round);
        let plfb = self.lfb();
        if round <= plfb.round {
            debug!("round {} is not above the LFB round {}", round, plfb.round);
            return Ok(());
        }
        let fb = match self.compute_finalized_block(round) {
            Some(fb) if fb.hash != plfb.hash => fb,
            _ => return Ok(()),
        };
        if fb.round > plfb.round {
            self.finalize_forward(round, plfb, fb)
        } else {
            self.roll_back(plfb, fb)
        }
    }

    fn tally_notarizations(&self, round: u64) {
        let count = self
            .rounds
            .get_round(round)
            .map_or(0, |r| r.notarized_blocks().len());
        let mut counters = self.counters.write();
        let len = counters.notarization_buckets.len();
        if len == 0 {
            return;
        }
        counters.notarization_buckets[count.min(len - 1)] += 1;
    }

    fn finalize_forward(&self, round: u64, plfb: Block, fb: Block) -> Result<(), ConsensusError> {
        let behind = round.saturating_sub(fb.round);
        if behind >= 2 * self.config.lfb_ticket_ahead {
            info!(
                "finalization of block {} of round {} skipped, {} rounds behind",
                fb.hash, fb.round, behind
            );
            return Ok(());
        }
        let mut frchain = vec![fb.clone()];
        let mut current = fb.clone();
        while current.prev_hash != plfb.hash {
            if frchain.len() >= self.config.max_fetch_depth {
                let missed = current.round.saturating_sub(plfb.round + 1);
                warn!(
                    "finalized chain of block {} not closed to the LFB, {} blocks missed",
                    fb.hash, missed
                );
                self.counters.write().missed_blocks += missed;
                break;
            }
            let prev = match self.blocks.get(&current.prev_hash) {
                Ok(prev) => prev,
                Err(_) => {
                    self.async_fetch_previous(&current);
                    return Err(ConsensusError::PreviousBlockUnavailable(format!(
                        "block {} of round {}",
                        current.prev_hash,
                        current.round.saturating_sub(1)
                    )));
                }
            };
            if prev.round <= plfb.round {
                return Err(ConsensusError::InsufficientChain(format!(
                    "block {} of round {} does not descend from the LFB {}",
                    fb.hash, fb.round, plfb.hash
                )));
            }
            frchain.push(prev.clone());
            current = prev;
        }

        self.view_change(&fb)?;
        let current_round = self.rounds.current_round();
        {
            let mut head = self.head.write();
            head.lfb = fb.clone();
        }
        self.counters.write().finalization_lag = current_round.saturating_sub(fb.round);
        info!(
            "LFB moved to block {} of round {} ({} blocks)",
            fb.hash,
            fb.round,
            frchain.len()
        );

        let push_timeout = self.config.finalization_push_timeout.to_duration();
        for block in frchain.iter().rev() {
            self.senders
                .finalize_block
                .send_timeout(block.clone(), push_timeout)
                .map_err(|err| {
                    ConsensusError::ChannelError(format!(
                        "finalize block {} of round {}: {}",
                        block.hash, block.round, err
                    ))
                })?;
        }
        if let Some(oldest) = frchain.last() {
            self.prune_chain(oldest);
        }
        Ok(())
    }

    fn roll_back(&self, plfb: Block, fb: Block) -> Result<(), ConsensusError> {
        let ancestor = self.common_ancestor(&plfb, &fb)?;
        let depth = plfb.round - ancestor.round;
        {
            let mut counters = self.counters.write();
            counters.rollback_count += 1;
            counters.longest_rollback = counters.longest_rollback.max(depth);
        }
        self.view_change(&ancestor)?;
        self.head.write().lfb = ancestor.clone();
        warn!(
            "rollback of {} rounds from block {} of round {} to block {} of round {}",
            depth, plfb.hash, plfb.round, ancestor.hash, ancestor.round
        );
        zchain_trace!("chain.rollback", {
            "from": plfb.hash.to_string(),
            "to": ancestor.hash.to_string(),
            "depth": depth
        });
        Ok(())
    }

    /// Deepest block that both `a` and `b` descend from
    pub fn common_ancestor(&self, a: &Block, b: &Block) -> Result<Block, ConsensusError> {
        let mut a = a.clone();
        let mut b = b.clone();
        while a.hash != b.hash {
            let step_a = a.round >= b.round;
            let step_b = b.round >= a.round;
            if step_a {
                a = self.previous_block(&a)?;
            }
            if step_b {
                b = self.previous_block(&b)?;
            }
        }
        Ok(a)
    }

    fn previous_block(&self, block: &Block) -> Result<Block, ConsensusError> {
        if block.round == 0 {
            return Err(ConsensusError::PreviousBlockUnavailable(format!(
                "genesis block {} has no parent",
                block.hash
            )));
        }
        self.blocks.get(&block.prev_hash).map_err(|_| {
            ConsensusError::PreviousBlockUnavailable(format!(
                "parent {} of block {} of round {}",
                block.prev_hash, block.hash, block.round
            ))
        })
    }

    /// Commit a finalized block: statistics, state persistence, magic block
    /// application, then the block state handler
    pub fn finalize_block(&self, block: Block) -> Result<(), ConsensusError> {
        let hash = block.hash;
        let mut block = self.blocks.get(&hash).unwrap_or(block);
        let num_generators = self.num_generators(block.round);
        if block.round > 0 && block.round_rank >= num_generators {
            warn!(
                "finalized block {} of round {} has rank {} above the {} generators",
                block.hash, block.round, block.round_rank, num_generators
            );
        }

        if !block.state_status.is_computed() {
            self.compute_block_state(&block);
            if let Ok(cached) = self.blocks.get(&hash) {
                block = cached;
            }
        }
        if block.state_status.is_computed() {
            if let Err(err) = self.channels.state.save_changes(&block) {
                warn!("state of block {} not saved: {}", block.hash, err);
            }
            if let Err(err) = self.channels.state.rebase_state(&block.hash) {
                warn!("state of block {} not rebased: {}", block.hash, err);
            }
        } else {
            warn!(
                "block {} of round {} finalized without state ({:?})",
                block.hash, block.round, block.state_status
            );
        }

        let timestamp = ChainTime::now()?;
        {
            let mut counters = self.counters.write();
            if let Some(stats) = counters.miner_stats.get_mut(&block.miner_id) {
                if let Some(count) = stats.finalization_count_by_rank.get_mut(block.round_rank) {
                    *count += 1;
                }
            }
            for txn in &block.txns {
                counters.fees.record(txn.fee.to_raw());
            }
            counters.finalized_count += 1;
            let info = ChainInfo {
                timestamp,
                finalized_round: block.round,
                finalized_count: counters.finalized_count,
                block_hash: block.hash,
                client_state_hash: block.client_state_hash,
                missed_blocks: counters.missed_blocks,
                rollback_count: counters.rollback_count,
            };
            let ring_size = self.config.chain_info_ring_size;
            counters.chain_info.push_back(info);
            counters.summaries.push_back(block.to_summary());
            while counters.chain_info.len() > ring_size {
                counters.chain_info.pop_front();
            }
            while counters.summaries.len() > ring_size {
                counters.summaries.pop_front();
            }
        }

        if let Some(mb) = &block.magic_block {
            let lfmb_number = self
                .magic_blocks
                .lfmb()
                .map_or(0, |lfmb| lfmb.magic_block_number);
            if mb.magic_block_number > lfmb_number {
                match self.update_magic_block(mb.clone()) {
                    Ok(()) => self.magic_blocks.set_lfmb(mb.clone()),
                    Err(err) => warn!(
                        "magic block {} of block {} not applied: {}",
                        mb.magic_block_number, block.hash, err
                    ),
                }
            }
        }

        if let Err(err) = self
            .channels
            .block_state_handler
            .update_finalized_block(&block)
        {
            warn!("finalized block {} not handled: {}", block.hash, err);
        }
        let magic_block_number = self
            .magic_blocks
            .lfmb()
            .map_or(0, |lfmb| lfmb.magic_block_number);
        self.head.write().lfb_record = LfbRoundRecord {
            round: block.round,
            hash: block.hash,
            magic_block_number,
        };

        self.remove_dead_siblings(&block);
        self.rounds.with_round(block.round, |round| round.set_finalized());
        if self.config.node_type == NodeType::Sharder
            && self.senders.lfb_ticket_broadcast.try_send(block.clone()).is_err()
        {
            debug!("LFB ticket broadcast of block {} skipped", block.hash);
        }
        debug!("block {} of round {} finalized", block.hash, block.round);
        zchain_trace!("chain.block_finalized", {
            "hash": block.hash.to_string(),
            "round": block.round,
            "miner": block.miner_id.to_string()
        });
        Ok(())
    }

    /// Drop the blocks competing with the ancestor found
    /// `dead_sibling_lookback` blocks below `block`
    fn remove_dead_siblings(&self, block: &Block) {
        let mut ancestor = block.clone();
        for _ in 0..self.config.dead_sibling_lookback {
            match self.previous_block(&ancestor) {
                Ok(prev) => ancestor = prev,
                Err(_) => return,
            }
        }
        for sibling in self.blocks.blocks_at_round(ancestor.round) {
            if sibling.hash == ancestor.hash {
                continue;
            }
            if self.blocks.remove(&sibling.hash).is_some() {
                self.channels.state.forget(&sibling.hash);
                debug!(
                    "dead block {} of round {} removed",
                    sibling.hash, sibling.round
                );
            }
        }
    }

    /// Forget blocks well below `oldest`, then old rounds
    fn prune_chain(&self, oldest: &Block) {
        let below = oldest.round.saturating_sub(self.config.prune_chain_depth);
        let deterministic_round = self.head.read().latest_deterministic.round;
        match ChainTime::now() {
            Ok(now) => {
                let stale_before = now.saturating_sub(self.config.block_stale_age);
                let removed = self
                    .blocks
                    .delete_below_round(below, deterministic_round, stale_before);
                for hash in &removed {
                    self.channels.state.forget(hash);
                }
                if !removed.is_empty() {
                    debug!("{} blocks pruned below round {}", removed.len(), below);
                }
            }
            Err(err) => warn!("chain pruning skipped: {}", err),
        }
        let current = self.rounds.current_round();
        self.rounds
            .delete_below(current.saturating_sub(self.config.round_retention));
    }
}
