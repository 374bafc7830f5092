// Copyright (c) 2022 The zchain developers

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use zchain_hash::Hash;

use crate::{StateError, TrieNode};

/// Storage of trie nodes by hash
pub trait NodeDb: Send + Sync {
    /// Node by hash
    fn get_node(&self, key: &Hash) -> Result<TrieNode, StateError>;

    /// Store a node
    fn put_node(&self, key: Hash, node: TrieNode);

    /// Store many nodes
    fn multi_put_node(&self, nodes: Vec<(Hash, TrieNode)>) {
        for (key, node) in nodes {
            self.put_node(key, node);
        }
    }

    /// Remove a node, absent keys are ignored
    fn delete_node(&self, key: &Hash);

    /// Number of stored nodes
    fn size(&self) -> usize;

    /// Remove every node older than `version`, returns how many were removed
    fn prune_below_version(&self, version: u64) -> usize;
}

/// In-memory node DB
#[derive(Default)]
pub struct MemoryNodeDb {
    nodes: RwLock<HashMap<Hash, TrieNode>>,
}

impl MemoryNodeDb {
    /// Empty DB
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored node
    pub fn snapshot(&self) -> Vec<(Hash, TrieNode)> {
        self.nodes
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}

impl NodeDb for MemoryNodeDb {
    fn get_node(&self, key: &Hash) -> Result<TrieNode, StateError> {
        self.nodes
            .read()
            .get(key)
            .cloned()
            .ok_or(StateError::NodeNotFound(*key))
    }

    fn put_node(&self, key: Hash, node: TrieNode) {
        self.nodes.write().insert(key, node);
    }

    fn multi_put_node(&self, nodes: Vec<(Hash, TrieNode)>) {
        let mut write_nodes = self.nodes.write();
        for (key, node) in nodes {
            write_nodes.insert(key, node);
        }
    }

    fn delete_node(&self, key: &Hash) {
        self.nodes.write().remove(key);
    }

    fn size(&self) -> usize {
        self.nodes.read().len()
    }

    fn prune_below_version(&self, version: u64) -> usize {
        let mut write_nodes = self.nodes.write();
        let before = write_nodes.len();
        write_nodes.retain(|_, node| node.version() >= version);
        before - write_nodes.len()
    }
}

/// Two-level node DB: writes go to `current`, reads fall back to `prev`.
///
/// Each block state writes into its own memory level layered over the level
/// of its parent. Rebasing points both levels to the persistent state DB once
/// the block changes are saved there, which detaches the block from the
/// overlay chain.
pub struct LevelNodeDb {
    current: RwLock<Arc<dyn NodeDb>>,
    prev: RwLock<Arc<dyn NodeDb>>,
}

impl LevelNodeDb {
    /// New level writing into `current` and reading through to `prev`
    pub fn new(current: Arc<dyn NodeDb>, prev: Arc<dyn NodeDb>) -> Self {
        LevelNodeDb {
            current: RwLock::new(current),
            prev: RwLock::new(prev),
        }
    }

    /// Level writing into `current`
    pub fn current(&self) -> Arc<dyn NodeDb> {
        self.current.read().clone()
    }

    /// Level read through
    pub fn prev(&self) -> Arc<dyn NodeDb> {
        self.prev.read().clone()
    }

    /// Replace both levels with `db`
    pub fn rebase_current_db(&self, db: Arc<dyn NodeDb>) {
        *self.current.write() = db.clone();
        *self.prev.write() = db;
    }
}

impl NodeDb for LevelNodeDb {
    fn get_node(&self, key: &Hash) -> Result<TrieNode, StateError> {
        match self.current().get_node(key) {
            Ok(node) => Ok(node),
            Err(StateError::NodeNotFound(_)) => self.prev().get_node(key),
            Err(e) => Err(e),
        }
    }

    fn put_node(&self, key: Hash, node: TrieNode) {
        self.current().put_node(key, node);
    }

    fn multi_put_node(&self, nodes: Vec<(Hash, TrieNode)>) {
        self.current().multi_put_node(nodes);
    }

    fn delete_node(&self, key: &Hash) {
        self.current().delete_node(key);
    }

    fn size(&self) -> usize {
        self.current().size()
    }

    fn prune_below_version(&self, version: u64) -> usize {
        self.current().prune_below_version(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: &[u8], version: u64) -> TrieNode {
        TrieNode::Leaf {
            path: vec![],
            value: value.to_vec(),
            version,
        }
    }

    #[test]
    fn test_level_reads_through_and_rebases() {
        let base: Arc<dyn NodeDb> = Arc::new(MemoryNodeDb::new());
        let a = leaf(b"a", 1);
        base.put_node(a.compute_hash(), a.clone());

        let level = LevelNodeDb::new(Arc::new(MemoryNodeDb::new()), base.clone());
        let b = leaf(b"b", 2);
        level.put_node(b.compute_hash(), b.clone());
        assert_eq!(level.get_node(&a.compute_hash()).unwrap(), a);
        assert_eq!(level.get_node(&b.compute_hash()).unwrap(), b);
        assert!(base.get_node(&b.compute_hash()).is_err());
        assert_eq!(level.size(), 1);

        let main: Arc<dyn NodeDb> = Arc::new(MemoryNodeDb::new());
        main.put_node(b.compute_hash(), b.clone());
        level.rebase_current_db(main);
        assert!(level.get_node(&a.compute_hash()).is_err());
        assert_eq!(level.get_node(&b.compute_hash()).unwrap(), b);
    }

    #[test]
    fn test_prune_below_version() {
        let db = MemoryNodeDb::new();
        for v in 0..10u64 {
            let node = leaf(&v.to_be_bytes(), v);
            db.put_node(node.compute_hash(), node);
        }
        assert_eq!(db.prune_below_version(4), 4);
        assert_eq!(db.size(), 6);
    }
}
