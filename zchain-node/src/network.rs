// Copyright (c) 2022 The zchain developers

use tracing::debug;
use zchain_consensus_exports::{error::ConsensusError, ChainNetwork};
use zchain_hash::Hash;
use zchain_models::{Block, BlockSummary, LfbTicket, NodeId, Version};
use zchain_state::TrieNode;
use zchain_time::ChainTime;

/// Transport of a node that has no peer connection: requests fail and
/// announcements are only logged.
#[derive(Default)]
pub struct DetachedNetwork;

impl DetachedNetwork {
    fn unreachable(what: &str) -> ConsensusError {
        ConsensusError::NetworkError(format!("{}: no peer transport", what))
    }
}

impl ChainNetwork for DetachedNetwork {
    fn fetch_block_from_miners(
        &self,
        hash: &Hash,
        round: u64,
        _miners: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Block, ConsensusError> {
        Err(Self::unreachable(&format!("block {} of round {}", hash, round)))
    }

    fn fetch_block_from_sharders(
        &self,
        hash: &Hash,
        round: u64,
        _sharders: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Block, ConsensusError> {
        Err(Self::unreachable(&format!("finalized block {} of round {}", hash, round)))
    }

    fn fetch_notarized_block(
        &self,
        round: u64,
        _miners: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Block, ConsensusError> {
        Err(Self::unreachable(&format!("notarized block of round {}", round)))
    }

    fn send_lfb_ticket(&self, ticket: &LfbTicket, nodes: &[NodeId], _timeout: ChainTime) {
        debug!(
            "LFB ticket of round {} not sent to {} nodes",
            ticket.round,
            nodes.len()
        );
    }

    fn get_state_nodes(
        &self,
        keys: &[Hash],
        _nodes: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Vec<(Hash, TrieNode)>, ConsensusError> {
        Err(Self::unreachable(&format!("{} state nodes", keys.len())))
    }

    fn get_lfb_from_sharders(&self, _sharders: &[NodeId], _timeout: ChainTime) -> Vec<BlockSummary> {
        Vec::new()
    }

    fn get_lfmb_from_sharders(&self, _sharders: &[NodeId], _timeout: ChainTime) -> Vec<Block> {
        Vec::new()
    }

    fn send_version(&self, version: Version, nodes: &[NodeId], _timeout: ChainTime) {
        debug!("version {} not announced to {} nodes", version, nodes.len());
    }
}
