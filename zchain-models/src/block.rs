// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use zchain_hash::Hash;
use zchain_time::ChainTime;

use crate::{MagicBlock, NodeId, Transaction, VerificationTicket};

/// Verification progress of a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockState {
    /// nothing done yet
    #[default]
    Unverified,
    /// verification running
    Verifying,
    /// verified by this node
    Verified,
    /// enough tickets gathered
    Notarized,
}

/// Progress of the state computation of a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StateStatus {
    /// not computed
    #[default]
    Pending,
    /// computed locally, root matches
    Success,
    /// computation failed or root mismatch
    Failed,
    /// state obtained from another node
    Synced,
}

impl StateStatus {
    /// Is the block state usable
    pub fn is_computed(&self) -> bool {
        matches!(self, StateStatus::Success | StateStatus::Synced)
    }
}

/// A block: immutable content plus the aggregation state gathered while it is
/// verified and notarized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// content hash
    pub hash: Hash,
    /// parent hash
    pub prev_hash: Hash,
    /// round
    pub round: u64,
    /// generator
    pub miner_id: NodeId,
    /// random seed of the round the block was generated in
    pub round_random_seed: u64,
    /// round timeout count when the block was generated
    pub round_timeout_count: u32,
    /// generator rank in the round, lower is heavier; not part of the hash
    pub round_rank: usize,
    /// state root after applying the transactions
    pub client_state_hash: Hash,
    /// transactions
    pub txns: Vec<Transaction>,
    /// committee installed by this block, if any
    pub magic_block: Option<MagicBlock>,
    /// generation time
    pub creation_date: ChainTime,
    /// accumulated weight of the chain ending here
    pub chain_weight: f64,
    verification_tickets: Vec<VerificationTicket>,
    unique_block_extensions: BTreeSet<NodeId>,
    /// state computation progress
    #[serde(skip)]
    pub state_status: StateStatus,
    /// verification progress
    #[serde(skip)]
    pub block_state: BlockState,
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Block {
    /// New block at `round` building on `prev_hash`. Round info, state root,
    /// transactions and magic block are set through the `with_*` helpers,
    /// then [`Block::seal`] computes the hash.
    pub fn new(prev_hash: Hash, round: u64, miner_id: NodeId, creation_date: ChainTime) -> Self {
        Block {
            hash: Hash::ZERO,
            prev_hash,
            round,
            miner_id,
            round_random_seed: 0,
            round_timeout_count: 0,
            round_rank: 0,
            client_state_hash: Hash::ZERO,
            txns: Vec::new(),
            magic_block: None,
            creation_date,
            chain_weight: 0.0,
            verification_tickets: Vec::new(),
            unique_block_extensions: BTreeSet::new(),
            state_status: StateStatus::Pending,
            block_state: BlockState::Unverified,
        }
    }

    /// Genesis block: round 0, no parent, finalized state
    pub fn genesis(client_state_hash: Hash, magic_block: MagicBlock) -> Self {
        let mut block = Block::new(Hash::ZERO, 0, NodeId::default(), ChainTime::from_millis(0))
            .with_state(client_state_hash)
            .with_magic_block(magic_block)
            .seal();
        block.chain_weight = 1.0;
        block.state_status = StateStatus::Success;
        block.block_state = BlockState::Notarized;
        block
    }

    /// Set round seed and timeout count
    #[must_use]
    pub fn with_round_info(mut self, round_random_seed: u64, round_timeout_count: u32) -> Self {
        self.round_random_seed = round_random_seed;
        self.round_timeout_count = round_timeout_count;
        self
    }

    /// Set the state root
    #[must_use]
    pub fn with_state(mut self, client_state_hash: Hash) -> Self {
        self.client_state_hash = client_state_hash;
        self
    }

    /// Set the transactions
    #[must_use]
    pub fn with_txns(mut self, txns: Vec<Transaction>) -> Self {
        self.txns = txns;
        self
    }

    /// Embed a committee
    #[must_use]
    pub fn with_magic_block(mut self, magic_block: MagicBlock) -> Self {
        self.magic_block = Some(magic_block);
        self
    }

    /// Compute and set the hash
    #[must_use]
    pub fn seal(mut self) -> Self {
        self.hash = self.compute_hash();
        self
    }

    /// Hash over the immutable content
    pub fn compute_hash(&self) -> Hash {
        let mut data: Vec<u8> = Vec::new();
        data.extend(self.miner_id.to_bytes());
        data.extend(self.prev_hash.to_bytes());
        data.extend(self.creation_date.to_millis().to_be_bytes());
        data.extend(self.round.to_be_bytes());
        data.extend(self.round_random_seed.to_be_bytes());
        data.extend(self.round_timeout_count.to_be_bytes());
        data.extend(self.client_state_hash.to_bytes());
        for txn in &self.txns {
            data.extend(txn.hash.to_bytes());
        }
        if let Some(mb) = &self.magic_block {
            data.extend(mb.hash.to_bytes());
        }
        Hash::compute_from(&data)
    }

    /// Weight of the block in its round: `1 / 2^rank`
    ///
    /// ```
    /// # use zchain_models::{Block, NodeId};
    /// # use zchain_hash::Hash;
    /// # use zchain_time::ChainTime;
    /// let mut block = Block::new(Hash::ZERO, 1, NodeId::default(), ChainTime::from_millis(0));
    /// block.round_rank = 2;
    /// assert_eq!(block.weight(), 0.25);
    /// ```
    pub fn weight(&self) -> f64 {
        1.0 / 2f64.powi(self.round_rank.min(i32::MAX as usize) as i32)
    }

    /// Set the chain weight from the parent's
    pub fn compute_chain_weight(&mut self, prev_chain_weight: f64) {
        self.chain_weight = prev_chain_weight + self.weight();
    }

    /// Tickets gathered so far
    pub fn verification_tickets(&self) -> &[VerificationTicket] {
        &self.verification_tickets
    }

    /// Number of tickets
    pub fn verification_tickets_count(&self) -> usize {
        self.verification_tickets.len()
    }

    /// Does `verifier_id` already have a ticket on this block
    pub fn has_ticket_from(&self, verifier_id: &NodeId) -> bool {
        self.verification_tickets
            .iter()
            .any(|t| t.verifier_id == *verifier_id)
    }

    /// Add a ticket, returns false if the verifier already signed or the
    /// block is notarized
    pub fn add_verification_ticket(&mut self, ticket: VerificationTicket) -> bool {
        if self.is_notarized() || self.has_ticket_from(&ticket.verifier_id) {
            return false;
        }
        self.verification_tickets.push(ticket);
        true
    }

    /// Keep only the tickets accepted by `keep`
    pub fn retain_verification_tickets(&mut self, keep: impl FnMut(&VerificationTicket) -> bool) {
        self.verification_tickets.retain(keep);
    }

    /// Union of tickets by verifier id, returns true if the set grew
    pub fn merge_verification_tickets(&mut self, tickets: &[VerificationTicket]) -> bool {
        let before = self.verification_tickets.len();
        for ticket in tickets {
            self.add_verification_ticket(ticket.clone());
        }
        self.verification_tickets.len() != before
    }

    /// Has the block gathered enough tickets
    pub fn is_notarized(&self) -> bool {
        self.block_state == BlockState::Notarized
    }

    /// Freeze tickets and state status
    pub fn set_notarized(&mut self) {
        self.block_state = BlockState::Notarized;
    }

    /// Record that a notarized block generated by `miner_id` extends this one,
    /// returns true if the miner was not counted yet
    pub fn add_unique_block_extension(&mut self, miner_id: NodeId) -> bool {
        self.unique_block_extensions.insert(miner_id)
    }

    /// Number of distinct miners extending this block
    pub fn unique_block_extensions_count(&self) -> usize {
        self.unique_block_extensions.len()
    }

    /// Summary kept in the finalized blocks ring
    pub fn to_summary(&self) -> BlockSummary {
        BlockSummary {
            hash: self.hash,
            round: self.round,
            miner_id: self.miner_id,
            round_rank: self.round_rank,
            client_state_hash: self.client_state_hash,
            magic_block_number: self.magic_block.as_ref().map(|mb| mb.magic_block_number),
            creation_date: self.creation_date,
        }
    }
}

/// Light description of a finalized block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// block hash
    pub hash: Hash,
    /// block round
    pub round: u64,
    /// generator
    pub miner_id: NodeId,
    /// generator rank
    pub round_rank: usize,
    /// state root
    pub client_state_hash: Hash,
    /// number of the embedded magic block, if any
    pub magic_block_number: Option<u64>,
    /// generation time
    pub creation_date: ChainTime,
}
