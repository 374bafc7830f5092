// Copyright (c) 2022 The zchain developers

use std::collections::HashMap;
use std::sync::Arc;
use zchain_hash::Hash;

use crate::node::FULL_NODE_CHILDREN;
use crate::{path_from_key, LevelNodeDb, MemoryNodeDb, NodeDb, StateError, TrieNode};

/// Merkle-Patricia trie over a node DB.
///
/// Nodes are immutable: every update writes new nodes and moves the root.
/// The nodes written through this trie are collected so that they can be
/// merged into a parent trie or saved into another DB.
pub struct Mpt {
    root: Hash,
    origin_root: Hash,
    db: Arc<dyn NodeDb>,
    version: u64,
    changes: HashMap<Hash, TrieNode>,
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn concat(head: &[u8], tail: &[u8]) -> Vec<u8> {
    let mut path = Vec::with_capacity(head.len() + tail.len());
    path.extend_from_slice(head);
    path.extend_from_slice(tail);
    path
}

impl Mpt {
    /// Trie rooted at `root` in `db`; new nodes get `version`
    pub fn new(root: Hash, db: Arc<dyn NodeDb>, version: u64) -> Self {
        Mpt {
            root,
            origin_root: root,
            db,
            version,
            changes: HashMap::new(),
        }
    }

    /// Current root, zero for the empty trie
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Version given to new nodes
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Node DB of the trie
    pub fn db(&self) -> Arc<dyn NodeDb> {
        self.db.clone()
    }

    /// Is the root node available in the DB
    pub fn is_root_present(&self) -> bool {
        self.root.is_zero() || self.db.get_node(&self.root).is_ok()
    }

    /// Trie layered over this one: its writes land in a private memory level
    /// until [`Mpt::merge_changes`] brings them back.
    pub fn sub_trie(&self) -> Mpt {
        let level = LevelNodeDb::new(Arc::new(MemoryNodeDb::new()), self.db.clone());
        Mpt::new(self.root, Arc::new(level), self.version)
    }

    /// Apply the changes of a sub-trie. Fails without touching this trie if
    /// it moved since the sub-trie was created.
    pub fn merge_changes(&mut self, sub: Mpt) -> Result<(), StateError> {
        if sub.origin_root != self.root {
            return Err(StateError::MptRootMismatch {
                expected: sub.origin_root,
                actual: self.root,
            });
        }
        let nodes: Vec<(Hash, TrieNode)> = sub.changes.into_iter().collect();
        self.db.multi_put_node(nodes.clone());
        self.changes.extend(nodes);
        self.root = sub.root;
        Ok(())
    }

    /// Number of nodes written through this trie
    pub fn changes_count(&self) -> usize {
        self.changes.len()
    }

    /// Write the collected nodes into `db`, returns how many
    pub fn save_changes(&self, db: &dyn NodeDb) -> usize {
        let nodes: Vec<(Hash, TrieNode)> = self
            .changes
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        let count = nodes.len();
        db.multi_put_node(nodes);
        count
    }

    /// Value stored under `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let path = path_from_key(key);
        let mut node_hash = self.root;
        let mut rest: &[u8] = &path;
        loop {
            if node_hash.is_zero() {
                return Ok(None);
            }
            match self.db.get_node(&node_hash)? {
                TrieNode::Leaf {
                    path: leaf_path,
                    value,
                    ..
                } => return Ok((leaf_path == rest).then_some(value)),
                TrieNode::Extension { path, child, .. } => {
                    if !rest.starts_with(&path) {
                        return Ok(None);
                    }
                    rest = &rest[path.len()..];
                    node_hash = child;
                }
                TrieNode::Full {
                    children, value, ..
                } => {
                    if rest.is_empty() {
                        return Ok(value);
                    }
                    match children[rest[0] as usize] {
                        Some(child) => {
                            node_hash = child;
                            rest = &rest[1..];
                        }
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Store `value` under `key`
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError> {
        let path = path_from_key(key);
        self.root = self.insert_at(self.root, &path, value)?;
        Ok(())
    }

    /// Remove `key`, fails with `ValueNotPresent` if absent
    pub fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        let path = path_from_key(key);
        self.root = self.delete_at(self.root, &path)?;
        Ok(())
    }

    fn put(&mut self, mut node: TrieNode) -> Hash {
        node.set_version(self.version);
        let hash = node.compute_hash();
        self.db.put_node(hash, node.clone());
        self.changes.insert(hash, node);
        hash
    }

    fn put_leaf(&mut self, path: &[u8], value: Vec<u8>) -> Hash {
        self.put(TrieNode::Leaf {
            path: path.to_vec(),
            value,
            version: 0,
        })
    }

    /// Full node holding the two given entries, behind an extension for their
    /// shared prefix
    fn branch(
        &mut self,
        prefix: &[u8],
        first: (&[u8], Vec<u8>),
        second: (&[u8], Vec<u8>),
    ) -> Hash {
        let mut children = [None; FULL_NODE_CHILDREN];
        let mut full_value = None;
        for (rest, value) in [first, second] {
            match rest.split_first() {
                Some((nibble, tail)) => {
                    children[*nibble as usize] = Some(self.put_leaf(tail, value));
                }
                None => full_value = Some(value),
            }
        }
        let full = self.put(TrieNode::Full {
            children,
            value: full_value,
            version: 0,
        });
        self.wrap_extension(prefix, full)
    }

    fn wrap_extension(&mut self, prefix: &[u8], child: Hash) -> Hash {
        if prefix.is_empty() {
            child
        } else {
            self.put(TrieNode::Extension {
                path: prefix.to_vec(),
                child,
                version: 0,
            })
        }
    }

    fn insert_at(&mut self, node_hash: Hash, path: &[u8], value: Vec<u8>) -> Result<Hash, StateError> {
        if node_hash.is_zero() {
            return Ok(self.put_leaf(path, value));
        }
        match self.db.get_node(&node_hash)? {
            TrieNode::Leaf {
                path: leaf_path,
                value: leaf_value,
                ..
            } => {
                if leaf_path == path {
                    return Ok(self.put_leaf(path, value));
                }
                let p = common_prefix_len(&leaf_path, path);
                Ok(self.branch(
                    &path[..p],
                    (&leaf_path[p..], leaf_value),
                    (&path[p..], value),
                ))
            }
            TrieNode::Extension {
                path: ext_path,
                child,
                ..
            } => {
                let p = common_prefix_len(&ext_path, path);
                if p == ext_path.len() {
                    let new_child = self.insert_at(child, &path[p..], value)?;
                    return Ok(self.put(TrieNode::Extension {
                        path: ext_path,
                        child: new_child,
                        version: 0,
                    }));
                }
                let mut children = [None; FULL_NODE_CHILDREN];
                let ext_tail = &ext_path[p + 1..];
                children[ext_path[p] as usize] = Some(self.wrap_extension(ext_tail, child));
                let mut full_value = None;
                match path[p..].split_first() {
                    Some((nibble, tail)) => {
                        children[*nibble as usize] = Some(self.put_leaf(tail, value));
                    }
                    None => full_value = Some(value),
                }
                let full = self.put(TrieNode::Full {
                    children,
                    value: full_value,
                    version: 0,
                });
                Ok(self.wrap_extension(&path[..p], full))
            }
            TrieNode::Full {
                mut children,
                value: full_value,
                ..
            } => {
                let full_value = match path.split_first() {
                    Some((nibble, tail)) => {
                        let child = children[*nibble as usize].unwrap_or(Hash::ZERO);
                        children[*nibble as usize] = Some(self.insert_at(child, tail, value)?);
                        full_value
                    }
                    None => Some(value),
                };
                Ok(self.put(TrieNode::Full {
                    children,
                    value: full_value,
                    version: 0,
                }))
            }
        }
    }

    fn delete_at(&mut self, node_hash: Hash, path: &[u8]) -> Result<Hash, StateError> {
        let not_present = || StateError::ValueNotPresent(format!("{:?}", path));
        if node_hash.is_zero() {
            return Err(not_present());
        }
        match self.db.get_node(&node_hash)? {
            TrieNode::Leaf {
                path: leaf_path, ..
            } => {
                if leaf_path == path {
                    Ok(Hash::ZERO)
                } else {
                    Err(not_present())
                }
            }
            TrieNode::Extension {
                path: ext_path,
                child,
                ..
            } => {
                if !path.starts_with(&ext_path) {
                    return Err(not_present());
                }
                let new_child = self.delete_at(child, &path[ext_path.len()..])?;
                if new_child.is_zero() {
                    return Ok(Hash::ZERO);
                }
                self.prefix_node(&ext_path, new_child)
            }
            TrieNode::Full {
                mut children,
                value,
                ..
            } => {
                let value = match path.split_first() {
                    None => {
                        if value.is_none() {
                            return Err(not_present());
                        }
                        None
                    }
                    Some((nibble, tail)) => {
                        let child = children[*nibble as usize].ok_or_else(not_present)?;
                        let new_child = self.delete_at(child, tail)?;
                        children[*nibble as usize] = (!new_child.is_zero()).then_some(new_child);
                        value
                    }
                };
                self.normalize_full(children, value)
            }
        }
    }

    /// Node equivalent to `prefix` followed by the node `child`
    fn prefix_node(&mut self, prefix: &[u8], child: Hash) -> Result<Hash, StateError> {
        match self.db.get_node(&child)? {
            TrieNode::Leaf { path, value, .. } => Ok(self.put(TrieNode::Leaf {
                path: concat(prefix, &path),
                value,
                version: 0,
            })),
            TrieNode::Extension {
                path, child: next, ..
            } => Ok(self.put(TrieNode::Extension {
                path: concat(prefix, &path),
                child: next,
                version: 0,
            })),
            TrieNode::Full { .. } => Ok(self.wrap_extension(prefix, child)),
        }
    }

    /// Collapse a full node left with a single entry
    fn normalize_full(
        &mut self,
        children: [Option<Hash>; FULL_NODE_CHILDREN],
        value: Option<Vec<u8>>,
    ) -> Result<Hash, StateError> {
        let present: Vec<(usize, Hash)> = children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|h| (i, h)))
            .collect();
        match (present.as_slice(), value) {
            ([], None) => Ok(Hash::ZERO),
            ([], Some(value)) => Ok(self.put_leaf(&[], value)),
            ([(nibble, child)], None) => self.prefix_node(&[*nibble as u8], *child),
            (_, value) => Ok(self.put(TrieNode::Full {
                children,
                value,
                version: 0,
            })),
        }
    }
}

/// Walk the trie under `root` and raise to `version` every node older than it.
/// Nodes missing from `db` are reported to `missing` and their subtree is
/// skipped. Returns the number of updated nodes.
pub fn update_version(
    db: &dyn NodeDb,
    root: Hash,
    version: u64,
    missing: &mut dyn FnMut(Hash),
) -> usize {
    let mut updated = 0;
    let mut stack = vec![root];
    while let Some(hash) = stack.pop() {
        if hash.is_zero() {
            continue;
        }
        match db.get_node(&hash) {
            Ok(mut node) => {
                stack.extend(node.child_hashes());
                if node.version() < version {
                    node.set_version(version);
                    db.put_node(hash, node);
                    updated += 1;
                }
            }
            Err(_) => missing(hash),
        }
    }
    updated
}
