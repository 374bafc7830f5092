// Copyright (c) 2022 The zchain developers

use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zchain_hash::Hash;

use crate::NodeId;

/// Step of a round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundPhase {
    /// collecting VRF shares
    #[default]
    ShareVrf,
    /// random seed known
    VrfComplete,
    /// generating a block
    Generate,
    /// own block generated
    Generated,
    /// verifying proposals
    Verify,
}

/// A notarized block of a round and the rank of its generator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizedEntry {
    /// block hash
    pub hash: Hash,
    /// generator rank
    pub rank: usize,
}

/// Per-round aggregation state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round {
    number: u64,
    random_seed: Option<u64>,
    timeout_count: u32,
    /// rank of each miner, indexed by set index
    miner_ranks: Vec<usize>,
    vrf_shares: BTreeMap<NodeId, Vec<u8>>,
    proposed_blocks: Vec<Hash>,
    notarized_blocks: Vec<NotarizedEntry>,
    phase: RoundPhase,
    finalizing: bool,
    finalized: bool,
}

/// Permutation of `0..miners_count` drawn from `seed`. Position `i` holds the
/// rank of the miner whose set index is `i`.
///
/// ```
/// # use zchain_models::round::compute_ranks;
/// let ranks = compute_ranks(42, 5);
/// let mut sorted = ranks.clone();
/// sorted.sort();
/// assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
/// assert_eq!(ranks, compute_ranks(42, 5));
/// ```
pub fn compute_ranks(seed: u64, miners_count: usize) -> Vec<usize> {
    let rng_seed = Hash::compute_from(&seed.to_be_bytes()).into_bytes();
    let mut rng = Xoshiro256PlusPlus::from_seed(rng_seed);
    let mut ranks: Vec<usize> = (0..miners_count).collect();
    ranks.shuffle(&mut rng);
    ranks
}

impl Round {
    /// Fresh round
    pub fn new(number: u64) -> Self {
        Round {
            number,
            random_seed: None,
            timeout_count: 0,
            miner_ranks: Vec::new(),
            vrf_shares: BTreeMap::new(),
            proposed_blocks: Vec::new(),
            notarized_blocks: Vec::new(),
            phase: RoundPhase::ShareVrf,
            finalizing: false,
            finalized: false,
        }
    }

    /// Round number
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Seed, once the VRF completed
    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    /// Set the seed and compute miner ranks. Refused (false) for a zero seed,
    /// an unchanged seed, or when the round already has notarized blocks.
    pub fn set_random_seed(&mut self, seed: u64, miners_count: usize) -> bool {
        if seed == 0 || self.random_seed == Some(seed) || !self.notarized_blocks.is_empty() {
            return false;
        }
        self.force_random_seed(seed, miners_count);
        true
    }

    fn force_random_seed(&mut self, seed: u64, miners_count: usize) {
        self.random_seed = Some(seed);
        self.miner_ranks = compute_ranks(seed, miners_count);
        self.phase = RoundPhase::VrfComplete;
    }

    /// Recompute ranks for a new miner count, keeping the seed
    pub fn recompute_ranks(&mut self, miners_count: usize) {
        if let Some(seed) = self.random_seed {
            self.miner_ranks = compute_ranks(seed, miners_count);
        }
    }

    /// Rank of the miner with `set_index`, once the seed is known
    pub fn miner_rank(&self, set_index: usize) -> Option<usize> {
        self.miner_ranks.get(set_index).copied()
    }

    /// Set indexes of the first `num_generators` miners by rank
    pub fn generators(&self, num_generators: usize) -> Vec<usize> {
        let mut by_rank: Vec<(usize, usize)> = self
            .miner_ranks
            .iter()
            .enumerate()
            .map(|(set_index, rank)| (*rank, set_index))
            .collect();
        by_rank.sort();
        by_rank
            .into_iter()
            .take(num_generators)
            .map(|(_, set_index)| set_index)
            .collect()
    }

    /// Timeouts seen in this round
    pub fn timeout_count(&self) -> u32 {
        self.timeout_count
    }

    /// Raise the timeout count, lower values are ignored
    pub fn set_timeout_count(&mut self, count: u32) -> bool {
        if count <= self.timeout_count {
            return false;
        }
        self.timeout_count = count;
        true
    }

    /// Record a VRF share, returns false if the node already shared
    pub fn add_vrf_share(&mut self, node_id: NodeId, share: Vec<u8>) -> bool {
        if self.vrf_shares.contains_key(&node_id) {
            return false;
        }
        self.vrf_shares.insert(node_id, share);
        true
    }

    /// Shares received so far
    pub fn vrf_shares(&self) -> &BTreeMap<NodeId, Vec<u8>> {
        &self.vrf_shares
    }

    /// Record a proposal, returns false if already known
    pub fn add_proposed_block(&mut self, hash: Hash) -> bool {
        if self.proposed_blocks.contains(&hash) {
            return false;
        }
        self.proposed_blocks.push(hash);
        true
    }

    /// Proposals seen so far
    pub fn proposed_blocks(&self) -> &[Hash] {
        &self.proposed_blocks
    }

    /// Record a notarized block. A block generated with another seed or a
    /// higher timeout count re-synchronizes the round from the block.
    /// Returns false if the block was already recorded.
    pub fn add_notarized_block(
        &mut self,
        hash: Hash,
        block_seed: u64,
        block_timeout_count: u32,
        miners_count: usize,
        miner_set_index: usize,
    ) -> bool {
        if self.notarized_blocks.iter().any(|e| e.hash == hash) {
            return false;
        }
        if self.random_seed != Some(block_seed) && block_seed != 0 {
            self.force_random_seed(block_seed, miners_count);
        }
        self.set_timeout_count(block_timeout_count);
        let rank = self.miner_rank(miner_set_index).unwrap_or(usize::MAX);
        self.notarized_blocks.push(NotarizedEntry { hash, rank });
        true
    }

    /// Notarized blocks in arrival order
    pub fn notarized_blocks(&self) -> &[NotarizedEntry] {
        &self.notarized_blocks
    }

    /// Does the round have a notarized block
    pub fn has_notarized_blocks(&self) -> bool {
        !self.notarized_blocks.is_empty()
    }

    /// Notarized block with the lowest rank, first seen wins ties
    pub fn heaviest_notarized_block(&self) -> Option<Hash> {
        self.notarized_blocks
            .iter()
            .fold(None::<&NotarizedEntry>, |best, e| match best {
                Some(b) if b.rank <= e.rank => Some(b),
                _ => Some(e),
            })
            .map(|e| e.hash)
    }

    /// Current phase
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Move to `phase`
    pub fn set_phase(&mut self, phase: RoundPhase) {
        self.phase = phase;
    }

    /// Flag the round as being finalized, false if it already was
    pub fn set_finalizing(&mut self) -> bool {
        if self.finalizing {
            return false;
        }
        self.finalizing = true;
        true
    }

    /// Is a finalization running or done
    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    /// Flag the round as finalized
    pub fn set_finalized(&mut self) {
        self.finalizing = true;
        self.finalized = true;
    }

    /// Has the round been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_random_seed_rules() {
        let mut round = Round::new(5);
        assert!(!round.set_random_seed(0, 4));
        assert!(round.set_random_seed(7, 4));
        assert!(!round.set_random_seed(7, 4));
        assert_eq!(round.random_seed(), Some(7));
        assert_eq!(round.phase(), RoundPhase::VrfComplete);
        assert!(round.miner_rank(3).is_some());
        assert!(round.miner_rank(4).is_none());

        assert!(round.add_notarized_block(Hash::compute_from(b"b"), 7, 0, 4, 0));
        assert!(!round.set_random_seed(8, 4));
    }

    #[test]
    fn test_notarized_block_resyncs_round() {
        let mut round = Round::new(5);
        round.set_random_seed(7, 4);
        let hash = Hash::compute_from(b"b");
        assert!(round.add_notarized_block(hash, 9, 2, 4, 1));
        assert_eq!(round.random_seed(), Some(9));
        assert_eq!(round.timeout_count(), 2);
        assert_eq!(round.notarized_blocks()[0].rank, compute_ranks(9, 4)[1]);
        assert!(!round.add_notarized_block(hash, 9, 2, 4, 1));
    }

    #[test]
    fn test_heaviest_notarized_block() {
        let mut round = Round::new(1);
        round.set_random_seed(11, 3);
        let ranks = compute_ranks(11, 3);
        let hashes: Vec<Hash> = (0..3u8).map(|i| Hash::compute_from(&[i])).collect();
        for (i, h) in hashes.iter().enumerate() {
            round.add_notarized_block(*h, 11, 0, 3, i);
        }
        let lightest_index = ranks.iter().position(|r| *r == 0).unwrap();
        assert_eq!(round.heaviest_notarized_block(), Some(hashes[lightest_index]));
        assert_eq!(round.generators(1), vec![lightest_index]);
    }

    #[test]
    fn test_finalizing_is_monotone() {
        let mut round = Round::new(1);
        assert!(round.set_finalizing());
        assert!(!round.set_finalizing());
        assert!(!round.is_finalized());
        round.set_finalized();
        assert!(round.is_finalized());
    }
}
