// Copyright (c) 2022 The zchain developers

use parking_lot::Mutex;
use std::collections::HashMap;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::ChainNetwork;
use zchain_hash::Hash;
use zchain_models::{Block, BlockSummary, LfbTicket, NodeId, Version};
use zchain_state::TrieNode;
use zchain_time::ChainTime;

#[derive(Default)]
struct FakeNetworkState {
    miner_blocks: HashMap<Hash, Block>,
    sharder_blocks: HashMap<Hash, Block>,
    notarized: HashMap<u64, Block>,
    state_nodes: HashMap<Hash, TrieNode>,
    lfb_replies: Vec<BlockSummary>,
    lfmb_replies: Vec<Block>,
    block_requests: Vec<Hash>,
    sent_tickets: Vec<(LfbTicket, Vec<NodeId>)>,
    sent_versions: Vec<(Version, Vec<NodeId>)>,
}

/// Network answering from what the test stored, recording what the engine sent
#[derive(Default)]
pub struct FakeNetwork {
    state: Mutex<FakeNetworkState>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block served by the miners
    pub fn add_miner_block(&self, block: Block) {
        self.state.lock().miner_blocks.insert(block.hash, block);
    }

    /// Block served by the sharders
    pub fn add_sharder_block(&self, block: Block) {
        self.state.lock().sharder_blocks.insert(block.hash, block);
    }

    /// Notarized block of its round served by the miners
    pub fn add_notarized_block(&self, block: Block) {
        self.state.lock().notarized.insert(block.round, block);
    }

    pub fn add_state_node(&self, hash: Hash, node: TrieNode) {
        self.state.lock().state_nodes.insert(hash, node);
    }

    pub fn set_lfb_replies(&self, replies: Vec<BlockSummary>) {
        self.state.lock().lfb_replies = replies;
    }

    pub fn set_lfmb_replies(&self, replies: Vec<Block>) {
        self.state.lock().lfmb_replies = replies;
    }

    /// Hashes asked to the miners or the sharders, in order
    pub fn block_requests(&self) -> Vec<Hash> {
        self.state.lock().block_requests.clone()
    }

    pub fn sent_tickets(&self) -> Vec<(LfbTicket, Vec<NodeId>)> {
        self.state.lock().sent_tickets.clone()
    }

    pub fn sent_versions(&self) -> Vec<(Version, Vec<NodeId>)> {
        self.state.lock().sent_versions.clone()
    }
}

impl ChainNetwork for FakeNetwork {
    fn fetch_block_from_miners(
        &self,
        hash: &Hash,
        round: u64,
        _miners: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Block, ConsensusError> {
        let mut state = self.state.lock();
        state.block_requests.push(*hash);
        state.miner_blocks.get(hash).cloned().ok_or_else(|| {
            ConsensusError::NetworkError(format!("no miner has block {} of round {}", hash, round))
        })
    }

    fn fetch_block_from_sharders(
        &self,
        hash: &Hash,
        round: u64,
        _sharders: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Block, ConsensusError> {
        let mut state = self.state.lock();
        state.block_requests.push(*hash);
        state.sharder_blocks.get(hash).cloned().ok_or_else(|| {
            ConsensusError::NetworkError(format!(
                "no sharder has block {} of round {}",
                hash, round
            ))
        })
    }

    fn fetch_notarized_block(
        &self,
        round: u64,
        _miners: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Block, ConsensusError> {
        self.state.lock().notarized.get(&round).cloned().ok_or_else(|| {
            ConsensusError::NetworkError(format!("no notarized block of round {}", round))
        })
    }

    fn send_lfb_ticket(&self, ticket: &LfbTicket, nodes: &[NodeId], _timeout: ChainTime) {
        self.state
            .lock()
            .sent_tickets
            .push((ticket.clone(), nodes.to_vec()));
    }

    fn get_state_nodes(
        &self,
        keys: &[Hash],
        _nodes: &[NodeId],
        _timeout: ChainTime,
    ) -> Result<Vec<(Hash, TrieNode)>, ConsensusError> {
        let state = self.state.lock();
        Ok(keys
            .iter()
            .filter_map(|key| state.state_nodes.get(key).map(|node| (*key, node.clone())))
            .collect())
    }

    fn get_lfb_from_sharders(&self, _sharders: &[NodeId], _timeout: ChainTime) -> Vec<BlockSummary> {
        self.state.lock().lfb_replies.clone()
    }

    fn get_lfmb_from_sharders(&self, _sharders: &[NodeId], _timeout: ChainTime) -> Vec<Block> {
        self.state.lock().lfmb_replies.clone()
    }

    fn send_version(&self, version: Version, nodes: &[NodeId], _timeout: ChainTime) {
        self.state
            .lock()
            .sent_versions
            .push((version, nodes.to_vec()));
    }
}
