// Copyright (c) 2022 The zchain developers

use crossbeam::channel::bounded;
use std::sync::Arc;
use tracing::debug;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::{ChainController, ChainStats, LfbTicketSubscription};
use zchain_hash::Hash;
use zchain_models::{
    Balance, Block, BlockSummary, ChainInfo, ClientId, LfbTicket, MagicBlock, NodeId,
    VerificationTicket, Version,
};
use zchain_state::TrieNode;

use crate::chain::Chain;
use crate::commands::LfbTicketCommand;

/// Reads go to the shared chain handle, ticket engine requests go through
/// its command queue.
///
/// Every way a block may become notarized hands its round to the finalizer.
#[derive(Clone)]
pub struct ChainControllerImpl {
    pub(crate) chain: Arc<Chain>,
}

impl ChainControllerImpl {
    pub(crate) fn new(chain: Arc<Chain>) -> Self {
        ChainControllerImpl { chain }
    }

    fn on_maybe_notarized(&self, block: &Block) {
        if block.is_notarized() {
            self.chain.request_round_finalization(block.round);
        }
    }
}

impl ChainController for ChainControllerImpl {
    fn add_block(&self, block: Block) -> Result<Block, ConsensusError> {
        let canonical = self.chain.add_block(block)?;
        self.on_maybe_notarized(&canonical);
        Ok(canonical)
    }

    fn add_verification_tickets(
        &self,
        block_hash: Hash,
        tickets: Vec<VerificationTicket>,
    ) -> Result<bool, ConsensusError> {
        let notarized = self.chain.add_verification_tickets(block_hash, tickets)?;
        if notarized {
            let block = self.chain.blocks.get(&block_hash)?;
            self.on_maybe_notarized(&block);
        }
        Ok(notarized)
    }

    fn add_notarized_block(&self, block: Block) -> Result<(), ConsensusError> {
        let round = block.round;
        self.chain.add_notarized_block(block)?;
        self.chain.request_round_finalization(round);
        Ok(())
    }

    fn set_random_seed(&self, round: u64, seed: u64) -> bool {
        self.chain.set_random_seed(round, seed)
    }

    fn finalize_round(&self, round: u64) {
        self.chain.request_round_finalization(round);
    }

    fn add_lfb_ticket(&self, ticket: LfbTicket, sender: NodeId) -> Result<(), ConsensusError> {
        self.chain.add_lfb_ticket(ticket, sender)
    }

    /// Asks the ticket engine, falls back to the last ticket it published
    fn get_latest_lfb_ticket(&self) -> Option<LfbTicket> {
        let timeout = self.chain.config.timeout_small_message.to_duration();
        let (reply_tx, reply_rx) = bounded(1);
        if self
            .chain
            .senders
            .lfb_ticket_command
            .send_timeout(LfbTicketCommand::GetLatest(reply_tx), timeout)
            .is_ok()
        {
            if let Ok(ticket) = reply_rx.recv_timeout(timeout) {
                return Some(ticket);
            }
        }
        debug!("LFB ticket engine did not answer, using the published ticket");
        Some(self.chain.latest_ticket.read().clone())
    }

    fn subscribe_lfb_tickets(&self) -> Result<LfbTicketSubscription, ConsensusError> {
        let id = self.chain.next_subscription_id();
        let (sender, receiver) = bounded(self.chain.config.lfb_ticket_queue_size);
        self.chain
            .senders
            .lfb_ticket_command
            .send_timeout(
                LfbTicketCommand::Subscribe(id, sender),
                self.chain.config.timeout_small_message.to_duration(),
            )
            .map_err(|err| ConsensusError::ChannelError(format!("LFB ticket subscribe: {}", err)))?;
        Ok(LfbTicketSubscription { id, receiver })
    }

    fn unsubscribe_lfb_tickets(&self, id: u64) {
        if self
            .chain
            .senders
            .lfb_ticket_command
            .try_send(LfbTicketCommand::Unsubscribe(id))
            .is_err()
        {
            debug!("LFB ticket unsubscribe {} dropped", id);
        }
    }

    fn get_block(&self, hash: &Hash) -> Result<Block, ConsensusError> {
        self.chain.blocks.get(hash)
    }

    fn get_notarized_block(&self, round: u64) -> Result<Block, ConsensusError> {
        self.chain.get_notarized_block(round)
    }

    fn get_latest_finalized_block(&self) -> BlockSummary {
        self.chain.lfb().to_summary()
    }

    fn get_latest_finalized_magic_block(&self, node_lfmb_hash: Option<Hash>) -> Option<MagicBlock> {
        self.chain.get_latest_finalized_magic_block(node_lfmb_hash)
    }

    fn get_lfb_from_sharders(&self) -> Vec<BlockSummary> {
        self.chain.get_lfb_from_sharders()
    }

    fn get_lfmb_from_sharders(&self) -> Option<Block> {
        let mb = self.chain.magic_blocks.latest()?;
        self.chain.get_lfmb_from_sharders(&mb)
    }

    fn is_block_syncing(&self) -> bool {
        self.chain.is_block_syncing()
    }

    fn get_balance(&self, client_id: &ClientId) -> Result<Balance, ConsensusError> {
        self.chain.get_balance(client_id)
    }

    fn get_state_nodes(&self, keys: &[Hash]) -> Vec<(Hash, TrieNode)> {
        self.chain.get_state_nodes(keys)
    }

    fn get_chain_info(&self) -> Vec<ChainInfo> {
        self.chain.get_chain_info()
    }

    fn get_stats(&self) -> ChainStats {
        self.chain.get_stats()
    }

    fn add_node_version(&self, node_id: NodeId, version: Version) -> Result<(), ConsensusError> {
        Ok(self.chain.versions.add(node_id, version)?)
    }

    fn get_consensus_version(&self) -> Option<Version> {
        self.chain.versions.get_consensus_version()
    }

    fn clone_box(&self) -> Box<dyn ChainController> {
        Box::new(self.clone())
    }
}
