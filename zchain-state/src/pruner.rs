// Copyright (c) 2022 The zchain developers

use std::sync::Arc;
use tracing::{debug, info};
use zchain_hash::Hash;
use zchain_models::BlockSummary;

use crate::{update_version, NodeDb, StateError, TrieNode};

/// Source of trie nodes missing locally
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait StateNodesFetcher: Send + Sync {
    /// Fetch the nodes with the given hashes from other nodes
    fn get_state_nodes(&self, keys: &[Hash]) -> Result<Vec<(Hash, TrieNode)>, StateError>;
}

/// Outcome of a pruning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// version everything older than was removed
    pub version: u64,
    /// nodes raised to `version`
    pub updated_nodes: usize,
    /// nodes fetched from other nodes
    pub synced_nodes: usize,
    /// nodes removed
    pub deleted_nodes: usize,
}

/// Version to prune at and its state root: walk back `below_count` entries
/// from the newest finalized block summary, then further back to a round that
/// is a multiple of `granularity`.
///
/// `summaries` are ordered by increasing round.
pub fn prune_target(
    summaries: &[BlockSummary],
    below_count: usize,
    granularity: u64,
) -> Option<(u64, Hash)> {
    let end = summaries.len().checked_sub(below_count)?;
    summaries[..end]
        .iter()
        .rev()
        .find(|s| granularity == 0 || s.round % granularity == 0)
        .map(|s| (s.round, s.client_state_hash))
}

/// Removes trie versions that no retained block can reach
pub struct StatePruner {
    db: Arc<dyn NodeDb>,
    fetcher: Option<Arc<dyn StateNodesFetcher>>,
    sync_batch_size: usize,
}

/// Passes over the trie while fetching missing nodes
const MAX_SYNC_PASSES: usize = 16;

impl StatePruner {
    /// Pruner of `db`, filling holes through `fetcher` when given
    pub fn new(
        db: Arc<dyn NodeDb>,
        fetcher: Option<Arc<dyn StateNodesFetcher>>,
        sync_batch_size: usize,
    ) -> Self {
        StatePruner {
            db,
            fetcher,
            sync_batch_size: sync_batch_size.max(1),
        }
    }

    /// Raise every node reachable from `root` to `version`, fetching missing
    /// ones by batches, then delete every node older than `version`. If
    /// nodes stay missing the delete phase is skipped and `PendingSync` is
    /// returned, to retry on the next pass.
    pub fn prune(&self, root: Hash, version: u64) -> Result<PruneStats, StateError> {
        let mut stats = PruneStats {
            version,
            ..Default::default()
        };
        let mut passes = 0;
        loop {
            let mut missing: Vec<Hash> = Vec::new();
            stats.updated_nodes += update_version(self.db.as_ref(), root, version, &mut |h| {
                missing.push(h)
            });
            if missing.is_empty() {
                break;
            }
            passes += 1;
            let fetcher = match (&self.fetcher, passes <= MAX_SYNC_PASSES) {
                (Some(fetcher), true) => fetcher,
                _ => return Err(StateError::PendingSync(missing.len())),
            };
            for batch in missing.chunks(self.sync_batch_size) {
                let nodes = fetcher.get_state_nodes(batch)?;
                if nodes.is_empty() {
                    return Err(StateError::PendingSync(missing.len()));
                }
                debug!("pruner synced {} state nodes", nodes.len());
                stats.synced_nodes += nodes.len();
                let nodes = nodes
                    .into_iter()
                    .filter(|(hash, node)| node.compute_hash() == *hash)
                    .collect();
                self.db.multi_put_node(nodes);
            }
        }
        stats.deleted_nodes = self.db.prune_below_version(version);
        info!(
            "state pruned below version {}: {} updated, {} synced, {} deleted",
            version, stats.updated_nodes, stats.synced_nodes, stats.deleted_nodes
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryNodeDb, Mpt};
    use assert_matches::assert_matches;
    use zchain_models::NodeId;
    use zchain_time::ChainTime;

    fn summary(round: u64) -> BlockSummary {
        BlockSummary {
            hash: Hash::compute_from(&round.to_be_bytes()),
            round,
            miner_id: NodeId::default(),
            round_rank: 0,
            client_state_hash: Hash::compute_from(&[round as u8]),
            magic_block_number: None,
            creation_date: ChainTime::from_millis(0),
        }
    }

    #[test]
    fn test_prune_target() {
        let ring: Vec<BlockSummary> = (150..=420).map(summary).collect();
        assert_eq!(prune_target(&ring, 100, 100).map(|t| t.0), Some(300));
        assert_eq!(prune_target(&ring, 250, 100), None);
        assert_eq!(prune_target(&ring, 1000, 100), None);
        assert_eq!(prune_target(&ring, 0, 0).map(|t| t.0), Some(420));
    }

    fn build(db: Arc<MemoryNodeDb>, version: u64, count: u8, root: Hash) -> Hash {
        let mut mpt = Mpt::new(root, db, version);
        for i in 0..count {
            mpt.insert(Hash::compute_from(&[i]).to_bytes(), vec![i, version as u8])
                .unwrap();
        }
        mpt.root()
    }

    #[test]
    fn test_prune_keeps_reachable_nodes() {
        let db = Arc::new(MemoryNodeDb::new());
        let old_root = build(db.clone(), 1, 10, Hash::ZERO);
        let new_root = build(db.clone(), 2, 10, old_root);
        let before = db.size();

        let pruner = StatePruner::new(db.clone(), None, 1000);
        let stats = pruner.prune(new_root, 2).unwrap();
        assert!(stats.deleted_nodes > 0);
        assert_eq!(db.size(), before - stats.deleted_nodes);

        let mpt = Mpt::new(new_root, db.clone(), 2);
        for i in 0..10u8 {
            assert_eq!(
                mpt.get(Hash::compute_from(&[i]).to_bytes()).unwrap(),
                Some(vec![i, 2])
            );
        }
        assert!(db.get_node(&old_root).is_err());
    }

    #[test]
    fn test_missing_nodes_are_synced() {
        let source = Arc::new(MemoryNodeDb::new());
        let root = build(source.clone(), 1, 10, Hash::ZERO);
        let db = Arc::new(MemoryNodeDb::new());
        db.put_node(root, source.get_node(&root).unwrap());

        let without_fetcher = StatePruner::new(db.clone(), None, 1000);
        assert_matches!(
            without_fetcher.prune(root, 5),
            Err(StateError::PendingSync(_))
        );

        let mut fetcher = MockStateNodesFetcher::new();
        let nodes = source.clone();
        fetcher.expect_get_state_nodes().returning(move |keys| {
            Ok(keys
                .iter()
                .filter_map(|k| nodes.get_node(k).ok().map(|n| (*k, n)))
                .collect())
        });
        let pruner = StatePruner::new(db.clone(), Some(Arc::new(fetcher)), 2);
        let stats = pruner.prune(root, 5).unwrap();
        assert!(stats.synced_nodes > 0);
        assert_eq!(stats.deleted_nodes, 0);
        let reachable = update_version(source.as_ref(), root, 9, &mut |_| {});
        assert_eq!(db.size(), reachable);
    }
}
