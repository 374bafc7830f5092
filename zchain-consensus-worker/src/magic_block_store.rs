// Copyright (c) 2022 The zchain developers

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use zchain_consensus_exports::error::ConsensusError;
use zchain_models::{mb_round_offset, MagicBlock, NodeId};

#[derive(Default)]
struct MagicBlockStoreRaw {
    by_starting_round: BTreeMap<u64, Arc<MagicBlock>>,
    previous: Option<Arc<MagicBlock>>,
    lfmb: Option<Arc<MagicBlock>>,
    lfmb_by_starting_round: BTreeMap<u64, Arc<MagicBlock>>,
}

impl MagicBlockStoreRaw {
    fn latest(&self) -> Option<Arc<MagicBlock>> {
        self.by_starting_round.values().next_back().cloned()
    }

    fn effective_key(&self, round: u64, view_change_offset: u64) -> Option<u64> {
        let target = mb_round_offset(round, view_change_offset);
        self.by_starting_round
            .range(..=target)
            .next_back()
            .map(|(k, _)| *k)
    }
}

/// Magic blocks by starting round, plus the latest finalized magic block
/// index
pub(crate) struct MagicBlockStore {
    view_change_offset: u64,
    inner: RwLock<MagicBlockStoreRaw>,
}

impl MagicBlockStore {
    pub fn new(view_change_offset: u64) -> Self {
        MagicBlockStore {
            view_change_offset,
            inner: RwLock::new(MagicBlockStoreRaw::default()),
        }
    }

    /// Magic block with the highest starting round
    pub fn latest(&self) -> Option<Arc<MagicBlock>> {
        self.inner.read().latest()
    }

    /// Magic block governing `round`: the one with the greatest starting round
    /// at or below `mb_round_offset(round)`, the latest one otherwise
    pub fn get(&self, round: u64) -> Option<Arc<MagicBlock>> {
        let raw = self.inner.read();
        match raw.effective_key(round, self.view_change_offset) {
            Some(key) => raw.by_starting_round.get(&key).cloned(),
            None => raw.latest(),
        }
    }

    /// Magic block preceding the one governing `round`
    pub fn get_prev(&self, round: u64) -> Option<Arc<MagicBlock>> {
        let raw = self.inner.read();
        let key = match raw.effective_key(round, self.view_change_offset) {
            Some(key) => key,
            None => *raw.by_starting_round.keys().next_back()?,
        };
        raw.by_starting_round
            .range(..key)
            .next_back()
            .map(|(_, mb)| mb.clone())
    }

    /// Magic block replaced by the last [`MagicBlockStore::put`]
    pub fn previous(&self) -> Option<Arc<MagicBlock>> {
        self.inner.read().previous.clone()
    }

    /// Can `mb` follow the current magic block. Known or older magic blocks
    /// are accepted. A successor must chain by hash to the current one when
    /// `self_id` belongs to it.
    pub fn check_chain(&self, mb: &MagicBlock, self_id: &NodeId) -> Result<(), ConsensusError> {
        let raw = self.inner.read();
        let current = match raw.latest() {
            Some(current) => current,
            None => return Ok(()),
        };
        if mb.magic_block_number <= current.magic_block_number {
            return Ok(());
        }
        if mb.magic_block_number == current.magic_block_number + 1
            && mb.previous_magic_block_hash != current.hash
            && mb.is_active_node(self_id)
        {
            return Err(ConsensusError::MagicBlockUpdate(format!(
                "magic block {} does not chain to magic block {}: previous hash {} instead of {}",
                mb.magic_block_number,
                current.magic_block_number,
                mb.previous_magic_block_hash,
                current.hash
            )));
        }
        Ok(())
    }

    /// Install `mb` as the current magic block, remembering the one it replaces
    pub fn put(&self, mb: MagicBlock, self_id: &NodeId) -> Result<(), ConsensusError> {
        self.check_chain(&mb, self_id)?;
        let mut raw = self.inner.write();
        if let Some(current) = raw.latest() {
            if current.hash == mb.hash {
                return Ok(());
            }
            raw.previous = Some(current);
        }
        info!(
            "magic block {} installed, starting round {}",
            mb.magic_block_number, mb.starting_round
        );
        raw.by_starting_round.insert(mb.starting_round, Arc::new(mb));
        Ok(())
    }

    /// Set the latest finalized magic block.
    ///
    /// # Panics
    /// If `mb` directly follows the current LFMB without chaining to its hash:
    /// the magic block chain of the deployment is corrupted.
    pub fn set_lfmb(&self, mb: MagicBlock) {
        let mut raw = self.inner.write();
        if let Some(lfmb) = &raw.lfmb {
            if mb.magic_block_number <= lfmb.magic_block_number {
                return;
            }
            if mb.magic_block_number == lfmb.magic_block_number + 1
                && mb.previous_magic_block_hash != lfmb.hash
            {
                panic!(
                    "magic block chain broken: magic block {} previous hash {} does not match magic block {} hash {}",
                    mb.magic_block_number, mb.previous_magic_block_hash, lfmb.magic_block_number, lfmb.hash
                );
            }
        }
        let mb = Arc::new(mb);
        raw.lfmb_by_starting_round
            .insert(mb.starting_round, mb.clone());
        raw.lfmb = Some(mb);
    }

    pub fn lfmb(&self) -> Option<Arc<MagicBlock>> {
        self.inner.read().lfmb.clone()
    }

    /// Finalized magic block governing `round`
    pub fn lfmb_for_round(&self, round: u64) -> Option<Arc<MagicBlock>> {
        let raw = self.inner.read();
        let target = mb_round_offset(round, self.view_change_offset);
        raw.lfmb_by_starting_round
            .range(..=target)
            .next_back()
            .map(|(_, mb)| mb.clone())
            .or_else(|| raw.lfmb.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use zchain_hash::Hash;
    use zchain_models::{Node, NodeType};
    use zchain_signature::KeyPair;

    fn mb(number: u64, starting_round: u64, prev: Hash, members: &[&KeyPair]) -> MagicBlock {
        let mut mb = MagicBlock::new(number, starting_round, prev);
        for key in members {
            mb.miners.add_node(Node::new(
                key.get_public_key(),
                NodeType::Miner,
                1,
                String::new(),
            ));
        }
        mb.finalize_hash();
        mb
    }

    #[test]
    fn test_get_with_view_change_offset() {
        let key = KeyPair::generate();
        let self_id = NodeId::from_public_key(&key.get_public_key());
        let store = MagicBlockStore::new(4);
        let mb1 = mb(1, 0, Hash::ZERO, &[&key]);
        let mb2 = mb(2, 100, mb1.hash, &[&key]);
        store.put(mb1.clone(), &self_id).unwrap();
        store.put(mb2.clone(), &self_id).unwrap();

        assert_eq!(store.latest().unwrap().hash, mb2.hash);
        assert_eq!(store.previous().unwrap().hash, mb1.hash);
        assert_eq!(store.get(3).unwrap().hash, mb1.hash);
        // 103 - 4 < 100
        assert_eq!(store.get(103).unwrap().hash, mb1.hash);
        assert_eq!(store.get(104).unwrap().hash, mb2.hash);
        assert_eq!(store.get_prev(104).unwrap().hash, mb1.hash);
        assert!(store.get_prev(50).is_none());
        for round in 5..200 {
            let effective = store.get(round).unwrap();
            assert!(effective.starting_round <= round - 4);
        }
    }

    #[test]
    fn test_put_rejects_broken_chain_for_members() {
        let key = KeyPair::generate();
        let self_id = NodeId::from_public_key(&key.get_public_key());
        let other = KeyPair::generate();
        let store = MagicBlockStore::new(4);
        let mb1 = mb(1, 0, Hash::ZERO, &[&key]);
        store.put(mb1.clone(), &self_id).unwrap();

        let broken = mb(2, 10, Hash::compute_from(b"elsewhere"), &[&key]);
        assert_matches!(
            store.put(broken, &self_id),
            Err(ConsensusError::MagicBlockUpdate(_))
        );
        assert_eq!(store.latest().unwrap().hash, mb1.hash);

        // not a member: accepted
        let foreign = mb(2, 10, Hash::compute_from(b"elsewhere"), &[&other]);
        store.put(foreign.clone(), &self_id).unwrap();
        assert_eq!(store.latest().unwrap().hash, foreign.hash);
    }

    #[test]
    fn test_lfmb_index() {
        let key = KeyPair::generate();
        let store = MagicBlockStore::new(4);
        let mb1 = mb(1, 0, Hash::ZERO, &[&key]);
        let mb2 = mb(2, 50, mb1.hash, &[&key]);
        store.set_lfmb(mb1.clone());
        store.set_lfmb(mb2.clone());
        // older magic blocks do not replace the LFMB
        store.set_lfmb(mb1.clone());
        assert_eq!(store.lfmb().unwrap().hash, mb2.hash);
        assert_eq!(store.lfmb_for_round(20).unwrap().hash, mb1.hash);
        assert_eq!(store.lfmb_for_round(60).unwrap().hash, mb2.hash);
    }

    #[test]
    #[should_panic(expected = "magic block chain broken")]
    fn test_lfmb_chain_discontinuity_panics() {
        let key = KeyPair::generate();
        let store = MagicBlockStore::new(4);
        store.set_lfmb(mb(1, 0, Hash::ZERO, &[&key]));
        store.set_lfmb(mb(2, 50, Hash::compute_from(b"elsewhere"), &[&key]));
    }
}
