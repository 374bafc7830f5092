// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zchain_signature::PublicKey;

use crate::{ClientId, NodeId};

/// Role of a committee member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// produces and verifies blocks
    Miner,
    /// stores finalized blocks and signs LFB tickets
    Sharder,
}

/// A committee member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// identity
    pub id: NodeId,
    /// key used to check the member's signatures
    pub public_key: PublicKey,
    /// miner or sharder
    pub node_type: NodeType,
    /// position in its pool, ordered by id
    pub set_index: usize,
    /// stake backing the member's votes
    pub stake: u64,
    /// network address
    pub host: String,
}

impl Node {
    /// New member whose id is derived from the key
    pub fn new(public_key: PublicKey, node_type: NodeType, stake: u64, host: String) -> Self {
        Node {
            id: ClientId::from_public_key(&public_key),
            public_key,
            node_type,
            set_index: 0,
            stake,
            host,
        }
    }
}

/// Members of one type. Set indexes follow the id order so that every node
/// computes the same indexes from the same magic block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    node_type: NodeType,
    nodes: BTreeMap<NodeId, Node>,
}

impl NodePool {
    /// Empty pool
    pub fn new(node_type: NodeType) -> Self {
        NodePool {
            node_type,
            nodes: BTreeMap::new(),
        }
    }

    /// Type of the pool members
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Add or replace a member, then recompute set indexes
    pub fn add_node(&mut self, mut node: Node) {
        node.node_type = self.node_type;
        self.nodes.insert(node.id, node);
        self.compute_set_indexes();
    }

    /// Remove a member, returns it if present
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let removed = self.nodes.remove(id);
        if removed.is_some() {
            self.compute_set_indexes();
        }
        removed
    }

    fn compute_set_indexes(&mut self) {
        for (index, node) in self.nodes.values_mut().enumerate() {
            node.set_index = index;
        }
    }

    /// Member by id
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Is `id` a member
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of members
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Is the pool empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Members ordered by set index
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Member ids ordered by set index
    pub fn keys(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Member with the given set index
    pub fn get_by_index(&self, set_index: usize) -> Option<&Node> {
        self.nodes.values().nth(set_index)
    }

    /// Sum of the members' stakes
    pub fn total_stake(&self) -> u64 {
        self.nodes
            .values()
            .fold(0u64, |acc, n| acc.saturating_add(n.stake))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zchain_signature::KeyPair;

    #[test]
    fn test_set_index_follows_id_order() {
        let mut pool = NodePool::new(NodeType::Miner);
        for _ in 0..5 {
            let key = KeyPair::generate().get_public_key();
            pool.add_node(Node::new(key, NodeType::Sharder, 10, String::new()));
        }
        assert_eq!(pool.size(), 5);
        let ids: Vec<NodeId> = pool.keys().copied().collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        for (i, node) in pool.nodes().enumerate() {
            assert_eq!(node.set_index, i);
            assert_eq!(node.node_type, NodeType::Miner);
        }
        assert_eq!(pool.total_stake(), 50);
        let first = ids[0];
        pool.remove_node(&first);
        assert_eq!(pool.get_by_index(0).map(|n| n.id), Some(ids[1]));
    }
}
