// Copyright (c) 2022 The zchain developers

use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use zchain_consensus_exports::error::ConsensusError;
use zchain_hash::Hash;
use zchain_models::{Block, VerificationTicket};

use super::Chain;

/// Deterministic finality rule: enough distinct miners built notarized
/// blocks on top of the block.
pub(crate) fn finalized_deterministically(
    unique_extensions: usize,
    miners_count: usize,
    threshold_by_count: u64,
) -> bool {
    unique_extensions as u64 * 100 >= miners_count as u64 * threshold_by_count
}

impl Chain {
    /// The verifier must be a miner of the magic block governing the block
    /// round, and the signature must cover the block hash
    pub fn verify_ticket(
        &self,
        block: &Block,
        ticket: &VerificationTicket,
    ) -> Result<(), ConsensusError> {
        let mb = self.magic_block_for_round(block.round)?;
        let verifier = mb.miners.get(&ticket.verifier_id).ok_or_else(|| {
            ConsensusError::InvalidTicket(format!(
                "verifier {} is not a miner of round {}",
                ticket.verifier_id, block.round
            ))
        })?;
        verifier
            .public_key
            .verify_signature(&block.hash, &ticket.signature)
            .map_err(|err| {
                ConsensusError::InvalidTicket(format!(
                    "ticket of {} on block {}: {}",
                    ticket.verifier_id, block.hash, err
                ))
            })
    }

    /// Count and stake thresholds, each one only when configured
    pub fn reached_notarization(&self, round: u64, tickets: &[VerificationTicket]) -> bool {
        let mb = match self.magic_blocks.get(round) {
            Some(mb) => mb,
            None => return false,
        };
        if self.config.threshold_by_count > 0 {
            let miners = mb.miners.size() as u64;
            if (tickets.len() as u64) * 100 < miners * self.config.threshold_by_count {
                return false;
            }
        }
        if self.config.threshold_by_stake > 0 {
            let stake: u64 = tickets
                .iter()
                .filter_map(|ticket| mb.miners.get(&ticket.verifier_id))
                .map(|node| node.stake)
                .sum();
            if stake < self.config.threshold_by_stake {
                return false;
            }
        }
        true
    }

    /// Check that `tickets` notarize `block`
    pub fn verify_notarization(
        &self,
        block: &Block,
        tickets: &[VerificationTicket],
    ) -> Result<(), ConsensusError> {
        if tickets.is_empty() {
            return Err(ConsensusError::NoVerificationTickets);
        }
        let mut signers = BTreeSet::new();
        for ticket in tickets {
            if !signers.insert(ticket.verifier_id) {
                return Err(ConsensusError::DuplicateTicketSignature(ticket.verifier_id));
            }
        }
        if !self.reached_notarization(block.round, tickets) {
            return Err(ConsensusError::BlockNotNotarized(block.hash));
        }
        for ticket in tickets {
            self.verify_ticket(block, ticket)?;
        }
        Ok(())
    }

    /// Merge already verified tickets into a cached block. The notarization
    /// is only re-evaluated when the ticket set grew. Returns whether the
    /// block is notarized.
    pub fn merge_verification_tickets(
        &self,
        hash: &Hash,
        tickets: &[VerificationTicket],
    ) -> Result<bool, ConsensusError> {
        let (changed, notarized) = self.blocks.update(hash, |block| {
            (block.merge_verification_tickets(tickets), block.is_notarized())
        })?;
        if !changed || notarized {
            return Ok(notarized);
        }
        self.notarize_if_reached(hash)
    }

    /// Verify then merge tickets received for a cached block. Invalid tickets
    /// are dropped.
    pub fn add_verification_tickets(
        &self,
        hash: Hash,
        tickets: Vec<VerificationTicket>,
    ) -> Result<bool, ConsensusError> {
        let block = self.blocks.get(&hash)?;
        let valid: Vec<VerificationTicket> = tickets
            .into_iter()
            .filter(|ticket| match self.verify_ticket(&block, ticket) {
                Ok(()) => true,
                Err(err) => {
                    warn!("dropping verification ticket: {}", err);
                    false
                }
            })
            .collect();
        self.merge_verification_tickets(&hash, &valid)
    }

    /// Register a block received along with its notarization
    pub fn add_notarized_block(&self, block: Block) -> Result<(), ConsensusError> {
        self.verify_notarization(&block, block.verification_tickets())?;
        let canonical = self.insert_block(block, true)?;
        if !canonical.is_notarized() {
            return Err(ConsensusError::BlockNotNotarized(canonical.hash));
        }
        Ok(())
    }

    /// Mark the block notarized once its tickets reach the thresholds. Cached
    /// tickets are always verified ones.
    pub(crate) fn notarize_if_reached(&self, hash: &Hash) -> Result<bool, ConsensusError> {
        let block = self.blocks.get(hash)?;
        if block.is_notarized() {
            return Ok(true);
        }
        if !self.reached_notarization(block.round, block.verification_tickets()) {
            return Ok(false);
        }
        let newly_notarized = self.blocks.update(hash, |block| {
            if block.is_notarized() {
                return false;
            }
            block.set_notarized();
            true
        })?;
        if newly_notarized {
            self.on_notarized(hash)?;
        }
        Ok(true)
    }

    /// Round bookkeeping of a freshly notarized block
    fn on_notarized(&self, hash: &Hash) -> Result<(), ConsensusError> {
        let block = self.blocks.get(hash)?;
        let mb = self.magic_block_for_round(block.round)?;
        let set_index = mb
            .miners
            .get(&block.miner_id)
            .map_or(usize::MAX, |node| node.set_index);
        let miners_count = mb.miners.size();
        let rank = self.rounds.with_round(block.round, |round| {
            round.add_notarized_block(
                block.hash,
                block.round_random_seed,
                block.round_timeout_count,
                miners_count,
                set_index,
            );
            round
                .notarized_blocks()
                .iter()
                .find(|entry| entry.hash == block.hash)
                .map_or(usize::MAX, |entry| entry.rank)
        });
        let prev_weight = self.blocks.get(&block.prev_hash).ok().map(|prev| prev.chain_weight);
        let block = self.blocks.update(hash, |cached| {
            if rank != usize::MAX {
                cached.round_rank = rank;
                if let Some(prev_weight) = prev_weight {
                    cached.compute_chain_weight(prev_weight);
                }
            }
            cached.clone()
        })?;
        {
            let mut counters = self.counters.write();
            if let Some(stats) = counters.miner_stats.get_mut(&block.miner_id) {
                if let Some(count) = stats.generation_count_by_rank.get_mut(rank) {
                    *count += 1;
                }
            }
        }
        self.rounds.set_current_round(block.round);
        debug!(
            "block {} of round {} notarized with rank {}",
            block.hash, block.round, rank
        );
        zchain_trace!("chain.block_notarized", {
            "hash": block.hash.to_string(),
            "round": block.round,
            "rank": rank
        });
        self.update_latest_deterministic(&block, miners_count);
        Ok(())
    }

    pub fn is_finalized_deterministically(&self, block: &Block) -> bool {
        let miners_count = self.magic_blocks.get(block.round).map_or(0, |mb| mb.miners.size());
        finalized_deterministically(
            block.unique_block_extensions_count(),
            miners_count,
            self.config.threshold_by_count,
        )
    }

    /// Credit the generator of a notarized block to its ancestors above the
    /// latest deterministic block, and promote the highest ancestor that
    /// became deterministic
    fn update_latest_deterministic(&self, block: &Block, miners_count: usize) {
        let (stop_round, lfb_round) = {
            let head = self.head.read();
            (head.latest_deterministic.round, head.lfb.round)
        };
        let threshold = self.config.threshold_by_count;
        let candidate = self.blocks.add_unique_extensions(block, stop_round, lfb_round, |b| {
            finalized_deterministically(b.unique_block_extensions_count(), miners_count, threshold)
        });
        if let Some(candidate) = candidate {
            let mut head = self.head.write();
            if candidate.round > head.latest_deterministic.round {
                info!(
                    "latest deterministic block {} at round {}",
                    candidate.hash, candidate.round
                );
                head.latest_deterministic = candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_rule() {
        assert!(!finalized_deterministically(6, 10, 67));
        assert!(finalized_deterministically(7, 10, 67));
        assert!(finalized_deterministically(0, 10, 0));
    }
}
