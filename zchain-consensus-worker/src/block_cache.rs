// Copyright (c) 2022 The zchain developers

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use zchain_consensus_exports::error::ConsensusError;
use zchain_hash::Hash;
use zchain_models::Block;
use zchain_time::ChainTime;

#[derive(Default)]
struct BlockCacheRaw {
    blocks: HashMap<Hash, Block>,
    by_round: BTreeMap<u64, BTreeSet<Hash>>,
}

impl BlockCacheRaw {
    fn remove(&mut self, hash: &Hash) -> Option<Block> {
        let block = self.blocks.remove(hash)?;
        if let Some(hashes) = self.by_round.get_mut(&block.round) {
            hashes.remove(hash);
            if hashes.is_empty() {
                self.by_round.remove(&block.round);
            }
        }
        Some(block)
    }
}

/// Blocks known to the node, by hash. The cache owns the blocks, parents are
/// resolved through their hash.
#[derive(Default)]
pub(crate) struct BlockCache {
    inner: RwLock<BlockCacheRaw>,
}

impl BlockCache {
    /// Insert `block`. If it is already known its tickets are merged into the
    /// cached instance, which stays canonical. Returns the canonical block.
    pub fn add(&self, mut block: Block) -> Block {
        let mut raw = self.inner.write();
        if let Some(existing) = raw.blocks.get_mut(&block.hash) {
            existing.merge_verification_tickets(block.verification_tickets());
            return existing.clone();
        }
        if let Some(prev) = raw.blocks.get(&block.prev_hash) {
            let prev_weight = prev.chain_weight;
            block.compute_chain_weight(prev_weight);
        }
        raw.by_round.entry(block.round).or_default().insert(block.hash);
        raw.blocks.insert(block.hash, block.clone());
        block
    }

    pub fn get(&self, hash: &Hash) -> Result<Block, ConsensusError> {
        self.inner
            .read()
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| ConsensusError::NotFound(format!("block {}", hash)))
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.read().blocks.contains_key(hash)
    }

    /// Mutate a cached block in place
    pub fn update<R>(&self, hash: &Hash, f: impl FnOnce(&mut Block) -> R) -> Result<R, ConsensusError> {
        let mut raw = self.inner.write();
        let block = raw
            .blocks
            .get_mut(hash)
            .ok_or_else(|| ConsensusError::NotFound(format!("block {}", hash)))?;
        Ok(f(block))
    }

    pub fn blocks_at_round(&self, round: u64) -> Vec<Block> {
        let raw = self.inner.read();
        raw.by_round
            .get(&round)
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|h| raw.blocks.get(h).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove(&self, hash: &Hash) -> Option<Block> {
        self.inner.write().remove(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    /// Credit the generator of `from` as a unique extension of each of its
    /// ancestors above `stop_round`. Returns the highest ancestor at or
    /// below `max_round` that `is_deterministic` accepts afterwards.
    pub fn add_unique_extensions(
        &self,
        from: &Block,
        stop_round: u64,
        max_round: u64,
        is_deterministic: impl Fn(&Block) -> bool,
    ) -> Option<Block> {
        let mut raw = self.inner.write();
        let mut best = None;
        let mut current = from.prev_hash;
        while let Some(block) = raw.blocks.get_mut(&current) {
            if block.round <= stop_round {
                break;
            }
            block.add_unique_block_extension(from.miner_id);
            if best.is_none() && block.round <= max_round && is_deterministic(block) {
                best = Some(block.clone());
            }
            current = block.prev_hash;
        }
        best
    }

    /// Remove the blocks below `round` that are also below
    /// `deterministic_round` and were created before `stale_before`.
    /// Returns the removed hashes.
    pub fn delete_below_round(
        &self,
        round: u64,
        deterministic_round: u64,
        stale_before: ChainTime,
    ) -> Vec<Hash> {
        let mut raw = self.inner.write();
        let candidates: Vec<Hash> = raw
            .by_round
            .range(..round.min(deterministic_round))
            .flat_map(|(_, hashes)| hashes.iter().copied())
            .collect();
        let mut removed = Vec::new();
        for hash in candidates {
            let stale = raw
                .blocks
                .get(&hash)
                .map_or(false, |b| b.creation_date < stale_before);
            if stale && raw.remove(&hash).is_some() {
                removed.push(hash);
            }
        }
        removed
    }
}
