// Copyright (c) 2022 The zchain developers

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use zchain_models::{NodeId, Version};

use crate::VersioningConfig;

/// Version tally errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersioningError {
    /// The reporter is not part of the committee
    #[error("node {0} is not in the committee")]
    UnknownNode(NodeId),
}

/// Tally of the versions reported by the committee
#[derive(Debug, Clone, Default)]
pub struct VersionsConsensusRaw {
    threshold_percent: u64,
    nodes: BTreeSet<NodeId>,
    /// reported version and report sequence number, by node
    versions: HashMap<NodeId, (Version, u64)>,
    next_sequence: u64,
}

/// Shared handle on the version tally
#[derive(Debug, Clone)]
pub struct VersionsConsensus(pub Arc<RwLock<VersionsConsensusRaw>>);

impl VersionsConsensus {
    /// Empty tally over `nodes`
    pub fn new(config: &VersioningConfig, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        VersionsConsensus(Arc::new(RwLock::new(VersionsConsensusRaw {
            threshold_percent: config.threshold_percent,
            nodes: nodes.into_iter().collect(),
            versions: HashMap::new(),
            next_sequence: 0,
        })))
    }

    /// Record the version reported by `node_id`, replacing its previous report
    pub fn add(&self, node_id: NodeId, version: Version) -> Result<(), VersioningError> {
        let mut store = self.0.write();
        if !store.nodes.contains(&node_id) {
            return Err(VersioningError::UnknownNode(node_id));
        }
        let sequence = store.next_sequence;
        store.next_sequence += 1;
        let previous = store.versions.insert(node_id, (version, sequence));
        if previous.map(|(v, _)| v) != Some(version) {
            debug!("node {} reports version {}", node_id, version);
        }
        Ok(())
    }

    /// Members needed to agree on a version
    pub fn threshold(&self) -> usize {
        let store = self.0.read();
        (store.threshold_percent as usize * store.nodes.len()) / 100
    }

    /// Version reported by at least the threshold of members, if any. Among
    /// versions with the same count the one first reported wins.
    pub fn get_consensus_version(&self) -> Option<Version> {
        let threshold = self.threshold();
        let store = self.0.read();
        if store.versions.len() < threshold {
            return None;
        }
        // version -> (votes, first report)
        let mut tally: HashMap<Version, (usize, u64)> = HashMap::new();
        for (version, sequence) in store.versions.values() {
            let entry = tally.entry(*version).or_insert((0, *sequence));
            entry.0 += 1;
            entry.1 = entry.1.min(*sequence);
        }
        let (version, (votes, _)) = tally
            .into_iter()
            .max_by(|(_, (votes_a, first_a)), (_, (votes_b, first_b))| {
                votes_a.cmp(votes_b).then(first_b.cmp(first_a))
            })?;
        (votes >= threshold && votes > 0).then_some(version)
    }

    /// Replace the committee: newcomers are added, and departed members are
    /// removed along with their reports
    pub fn update_nodes_list(&self, nodes: impl IntoIterator<Item = NodeId>) {
        let mut store = self.0.write();
        let nodes: BTreeSet<NodeId> = nodes.into_iter().collect();
        store.versions.retain(|id, _| nodes.contains(id));
        store.nodes = nodes;
    }

    /// Number of members
    pub fn nodes_count(&self) -> usize {
        self.0.read().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use more_asserts::assert_lt;
    use std::str::FromStr;

    fn config(threshold_percent: u64) -> VersioningConfig {
        VersioningConfig {
            threshold_percent,
            broadcast_period: zchain_time::ChainTime::from_millis(1000),
            node_version: Version::new(1, 0, 0),
        }
    }

    fn committee(n: usize) -> Vec<NodeId> {
        (0..n)
            .map(|i| NodeId::from_label(&format!("node{}", i)))
            .collect()
    }

    #[test]
    fn test_version_consensus_scenario() {
        let nodes = committee(10);
        let consensus = VersionsConsensus::new(&config(80), nodes.clone());
        let v1 = Version::from_str("1.0.0").unwrap();
        let v2 = Version::from_str("2.0.0").unwrap();
        for node in &nodes[..7] {
            consensus.add(*node, v1).unwrap();
        }
        consensus.add(nodes[7], v2).unwrap();
        assert_eq!(consensus.threshold(), 8);
        assert_eq!(consensus.get_consensus_version(), None);

        // the 8th vote for 1.0.0 comes from a node that reported 2.0.0
        consensus.add(nodes[7], v1).unwrap();
        assert_eq!(consensus.get_consensus_version(), Some(v1));

        consensus.add(nodes[8], v2).unwrap();
        consensus.add(nodes[9], v2).unwrap();
        assert_eq!(consensus.get_consensus_version(), Some(v1));
    }

    #[test]
    fn test_unknown_node_rejected() {
        let consensus = VersionsConsensus::new(&config(80), committee(3));
        let stranger = NodeId::from_label("stranger");
        assert_matches!(
            consensus.add(stranger, Version::new(1, 0, 0)),
            Err(VersioningError::UnknownNode(id)) if id == stranger
        );
    }

    #[test]
    fn test_tie_under_threshold_is_none() {
        let nodes = committee(4);
        let consensus = VersionsConsensus::new(&config(50), nodes.clone());
        consensus.add(nodes[0], Version::new(1, 0, 0)).unwrap();
        consensus.add(nodes[1], Version::new(2, 0, 0)).unwrap();
        assert_eq!(consensus.get_consensus_version(), None);
        consensus.add(nodes[2], Version::new(2, 0, 0)).unwrap();
        assert_eq!(consensus.get_consensus_version(), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_first_seen_wins_ties() {
        let nodes = committee(4);
        let consensus = VersionsConsensus::new(&config(50), nodes.clone());
        consensus.add(nodes[0], Version::new(2, 0, 0)).unwrap();
        consensus.add(nodes[1], Version::new(1, 0, 0)).unwrap();
        consensus.add(nodes[2], Version::new(1, 0, 0)).unwrap();
        consensus.add(nodes[3], Version::new(2, 0, 0)).unwrap();
        assert_eq!(consensus.get_consensus_version(), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_update_nodes_list_drops_reports() {
        let nodes = committee(5);
        let consensus = VersionsConsensus::new(&config(80), nodes.clone());
        for node in &nodes {
            consensus.add(*node, Version::new(1, 0, 0)).unwrap();
        }
        consensus.update_nodes_list(nodes[..2].iter().copied().chain(committee_extra()));
        assert_eq!(consensus.nodes_count(), 5);
        assert_lt!(consensus.0.read().versions.len(), 5);
        assert_eq!(consensus.get_consensus_version(), None);
    }

    fn committee_extra() -> Vec<NodeId> {
        (0..3)
            .map(|i| NodeId::from_label(&format!("new{}", i)))
            .collect()
    }
}
