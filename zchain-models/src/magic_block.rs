// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use zchain_hash::Hash;

use crate::{ModelsError, NodeId, NodePool, NodeType};

/// Round whose magic block governs `round`: rounds adopt a new committee
/// `view_change_offset` rounds after it starts.
///
/// ```
/// # use zchain_models::mb_round_offset;
/// assert_eq!(mb_round_offset(3, 4), 3);
/// assert_eq!(mb_round_offset(4, 4), 4);
/// assert_eq!(mb_round_offset(5, 4), 1);
/// assert_eq!(mb_round_offset(104, 4), 100);
/// ```
pub fn mb_round_offset(round: u64, view_change_offset: u64) -> u64 {
    if round < view_change_offset + 1 {
        round
    } else {
        round - view_change_offset
    }
}

/// Committee snapshot governing a range of rounds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicBlock {
    /// content hash, see [`MagicBlock::compute_hash`]
    pub hash: Hash,
    /// hash of the magic block this one replaces
    pub previous_magic_block_hash: Hash,
    /// sequence number, consecutive magic blocks differ by one
    pub magic_block_number: u64,
    /// first round governed by this committee
    pub starting_round: u64,
    /// miners
    pub miners: NodePool,
    /// sharders
    pub sharders: NodePool,
    /// threshold signature parameter T
    pub t: usize,
    /// threshold signature parameter K
    pub k: usize,
    /// threshold signature parameter N
    pub n: usize,
    /// DKG shares or signatures, by node
    pub share_or_signs: BTreeMap<NodeId, Vec<u8>>,
    /// master public keys, by node
    pub mpks: BTreeMap<NodeId, Vec<u8>>,
}

impl MagicBlock {
    /// Empty committee, hash left at zero until [`MagicBlock::finalize_hash`]
    pub fn new(magic_block_number: u64, starting_round: u64, previous_magic_block_hash: Hash) -> Self {
        MagicBlock {
            hash: Hash::ZERO,
            previous_magic_block_hash,
            magic_block_number,
            starting_round,
            miners: NodePool::new(NodeType::Miner),
            sharders: NodePool::new(NodeType::Sharder),
            t: 0,
            k: 0,
            n: 0,
            share_or_signs: BTreeMap::new(),
            mpks: BTreeMap::new(),
        }
    }

    /// Hash over the number, rounds, member ids and threshold parameters
    pub fn compute_hash(&self) -> Hash {
        let mut data: Vec<u8> = Vec::new();
        data.extend(self.magic_block_number.to_be_bytes());
        data.extend(self.previous_magic_block_hash.to_bytes());
        data.extend(self.starting_round.to_be_bytes());
        for id in self.miners.keys() {
            data.extend(id.to_bytes());
        }
        for id in self.sharders.keys() {
            data.extend(id.to_bytes());
        }
        for id in self.share_or_signs.keys() {
            data.extend(id.to_bytes());
        }
        for id in self.mpks.keys() {
            data.extend(id.to_bytes());
        }
        for param in [self.t, self.k, self.n] {
            data.extend((param as u64).to_be_bytes());
        }
        Hash::compute_from(&data)
    }

    /// Set `hash` from the current content
    pub fn finalize_hash(&mut self) {
        self.hash = self.compute_hash();
    }

    /// Structural check of a received magic block
    pub fn check(&self) -> Result<(), ModelsError> {
        if self.miners.is_empty() {
            return Err(ModelsError::InvalidEntity(format!(
                "magic block {} has no miners",
                self.magic_block_number
            )));
        }
        if self.hash != self.compute_hash() {
            return Err(ModelsError::InvalidEntity(format!(
                "magic block {} hash mismatch",
                self.magic_block_number
            )));
        }
        Ok(())
    }

    /// Is `id` a miner or a sharder of this committee
    pub fn is_active_node(&self, id: &NodeId) -> bool {
        self.miners.contains(id) || self.sharders.contains(id)
    }

    /// Ids of every member
    pub fn all_node_ids(&self) -> BTreeSet<NodeId> {
        self.miners
            .keys()
            .chain(self.sharders.keys())
            .copied()
            .collect()
    }

    /// Number of generators per round:
    /// `max(min_generators, ceil(generators_percent * miners))`, capped by the miner count
    ///
    /// ```
    /// # use zchain_models::MagicBlock;
    /// # use zchain_hash::Hash;
    /// let mb = MagicBlock::new(1, 0, Hash::ZERO);
    /// assert_eq!(mb.num_generators(2, 0.2), 0);
    /// ```
    pub fn num_generators(&self, min_generators: usize, generators_percent: f64) -> usize {
        let miners = self.miners.size();
        let by_percent = (generators_percent * miners as f64).ceil() as usize;
        by_percent.max(min_generators).min(miners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Node;
    use zchain_signature::KeyPair;

    fn magic_block(miners: usize) -> MagicBlock {
        let mut mb = MagicBlock::new(1, 0, Hash::ZERO);
        for _ in 0..miners {
            let key = KeyPair::generate().get_public_key();
            mb.miners
                .add_node(Node::new(key, NodeType::Miner, 1, String::new()));
        }
        mb.finalize_hash();
        mb
    }

    #[test]
    fn test_num_generators() {
        let mb = magic_block(10);
        assert_eq!(mb.num_generators(2, 0.2), 2);
        assert_eq!(mb.num_generators(2, 0.25), 3);
        assert_eq!(mb.num_generators(1, 1.0), 10);
        assert_eq!(mb.num_generators(20, 0.1), 10);
    }

    #[test]
    fn test_check_and_hash() {
        let mut mb = magic_block(3);
        assert!(mb.check().is_ok());
        mb.starting_round = 100;
        assert!(mb.check().is_err());
        mb.finalize_hash();
        assert!(mb.check().is_ok());
        assert!(MagicBlock::new(2, 0, Hash::ZERO).check().is_err());
        let id = *mb.miners.keys().next().unwrap();
        assert!(mb.is_active_node(&id));
        assert_eq!(mb.all_node_ids().len(), 3);
    }
}
