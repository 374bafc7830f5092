// Copyright (c) 2022 The zchain developers

use zchain_hash::Hash;
use zchain_models::{Block, BlockSummary, LfbTicket, NodeId, Version};
use zchain_state::TrieNode;
use zchain_time::ChainTime;

use crate::error::ConsensusError;

/// Requests the chain engine sends to other nodes. Every call carries the
/// timeout the transport must apply.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait ChainNetwork: Send + Sync {
    /// Ask `miners` for the block `hash` of `round`
    fn fetch_block_from_miners(
        &self,
        hash: &Hash,
        round: u64,
        miners: &[NodeId],
        timeout: ChainTime,
    ) -> Result<Block, ConsensusError>;

    /// Ask `sharders` for the finalized block `hash` of `round`
    fn fetch_block_from_sharders(
        &self,
        hash: &Hash,
        round: u64,
        sharders: &[NodeId],
        timeout: ChainTime,
    ) -> Result<Block, ConsensusError>;

    /// Ask `miners` for a notarized block of `round`
    fn fetch_notarized_block(
        &self,
        round: u64,
        miners: &[NodeId],
        timeout: ChainTime,
    ) -> Result<Block, ConsensusError>;

    /// Send an LFB ticket to `nodes`
    fn send_lfb_ticket(&self, ticket: &LfbTicket, nodes: &[NodeId], timeout: ChainTime);

    /// Fetch trie nodes by hash
    fn get_state_nodes(
        &self,
        keys: &[Hash],
        nodes: &[NodeId],
        timeout: ChainTime,
    ) -> Result<Vec<(Hash, TrieNode)>, ConsensusError>;

    /// Latest finalized block summary of each responding sharder
    fn get_lfb_from_sharders(&self, sharders: &[NodeId], timeout: ChainTime) -> Vec<BlockSummary>;

    /// Latest finalized magic block of each responding sharder, as the block carrying it
    fn get_lfmb_from_sharders(&self, sharders: &[NodeId], timeout: ChainTime) -> Vec<Block>;

    /// Announce the version we run to `nodes`
    fn send_version(&self, version: Version, nodes: &[NodeId], timeout: ChainTime);
}
