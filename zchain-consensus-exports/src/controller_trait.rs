// Copyright (c) 2022 The zchain developers

use zchain_hash::Hash;
use zchain_models::{
    Balance, Block, BlockSummary, ChainInfo, ClientId, LfbTicket, MagicBlock, NodeId,
    VerificationTicket, Version,
};
use zchain_state::TrieNode;

use crate::{error::ConsensusError, ChainStats, LfbTicketSubscription};

/// Interface that communicates with the chain engine
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait ChainController: Send + Sync {
    /// Register a proposed or observed block, returns the canonical instance
    fn add_block(&self, block: Block) -> Result<Block, ConsensusError>;

    /// Verify and merge verification tickets into a known block.
    /// Returns whether the block is notarized afterwards.
    fn add_verification_tickets(
        &self,
        block_hash: Hash,
        tickets: Vec<VerificationTicket>,
    ) -> Result<bool, ConsensusError>;

    /// Register a block received with its notarization
    fn add_notarized_block(&self, block: Block) -> Result<(), ConsensusError>;

    /// Set the random seed of a round. Returns false if nothing changed.
    fn set_random_seed(&self, round: u64, seed: u64) -> bool;

    /// Hand a round over to the finalizer
    fn finalize_round(&self, round: u64);

    /// LFB ticket received from `sender`
    fn add_lfb_ticket(&self, ticket: LfbTicket, sender: NodeId) -> Result<(), ConsensusError>;

    /// Latest LFB ticket accepted
    fn get_latest_lfb_ticket(&self) -> Option<LfbTicket>;

    /// Be told about accepted LFB tickets
    fn subscribe_lfb_tickets(&self) -> Result<LfbTicketSubscription, ConsensusError>;

    /// Stop being told about accepted LFB tickets
    fn unsubscribe_lfb_tickets(&self, id: u64);

    /// Block from the cache
    fn get_block(&self, hash: &Hash) -> Result<Block, ConsensusError>;

    /// Heaviest notarized block of a round, served to other miners
    fn get_notarized_block(&self, round: u64) -> Result<Block, ConsensusError>;

    /// Latest finalized block
    fn get_latest_finalized_block(&self) -> BlockSummary;

    /// Latest finalized magic block, or `None` if `node_lfmb_hash` is already its hash
    fn get_latest_finalized_magic_block(&self, node_lfmb_hash: Option<Hash>) -> Option<MagicBlock>;

    /// Latest finalized blocks reported by the sharders, best first
    fn get_lfb_from_sharders(&self) -> Vec<BlockSummary>;

    /// Block carrying the latest finalized magic block known to the sharders
    fn get_lfmb_from_sharders(&self) -> Option<Block>;

    /// Is the node lagging behind the network
    fn is_block_syncing(&self) -> bool;

    /// Balance of a client in the state of the latest finalized block
    fn get_balance(&self, client_id: &ClientId) -> Result<Balance, ConsensusError>;

    /// Trie nodes served to syncing nodes
    fn get_state_nodes(&self, keys: &[Hash]) -> Vec<(Hash, TrieNode)>;

    /// Recent finalization records, oldest first
    fn get_chain_info(&self) -> Vec<ChainInfo>;

    /// Chain counters
    fn get_stats(&self) -> ChainStats;

    /// Version announced by a committee member
    fn add_node_version(&self, node_id: NodeId, version: Version) -> Result<(), ConsensusError>;

    /// Version agreed by the committee, if any
    fn get_consensus_version(&self) -> Option<Version>;

    /// Returns a boxed clone of self.
    /// Allows cloning `Box<dyn ChainController>`,
    fn clone_box(&self) -> Box<dyn ChainController>;
}

/// Allow cloning `Box<dyn ChainController>`
/// Uses `ChainController::clone_box` internally
impl Clone for Box<dyn ChainController> {
    fn clone(&self) -> Box<dyn ChainController> {
        self.clone_box()
    }
}

/// Chain engine manager used to stop the worker threads
pub trait ChainManager {
    /// Stop the worker threads
    /// Note that we do not take self by value to consume it
    /// because it is not allowed to move out of Box<dyn ChainManager>
    fn stop(&mut self);
}
