// Copyright (c) 2022 The zchain developers

use std::sync::Arc;
use zchain_hash::Hash;
use zchain_models::{
    Balance, Block, ClientId, MagicBlock, Node, NodeId, NodeType, VerificationTicket,
};
use zchain_signature::KeyPair;
use zchain_state::{MemoryNodeDb, NoopSmartContractExecutor, StateConfig, StateDriver};
use zchain_time::ChainTime;

/// Stake of every committee member
pub const MEMBER_STAKE: u64 = 10;

/// Keys of a committee, able to produce its magic blocks
#[derive(Clone)]
pub struct Committee {
    pub miners: Vec<KeyPair>,
    pub sharders: Vec<KeyPair>,
}

impl Committee {
    pub fn new(miners: usize, sharders: usize) -> Self {
        Committee {
            miners: (0..miners).map(|_| KeyPair::generate()).collect(),
            sharders: (0..sharders).map(|_| KeyPair::generate()).collect(),
        }
    }

    pub fn id(keypair: &KeyPair) -> NodeId {
        NodeId::from_public_key(&keypair.get_public_key())
    }

    pub fn miner_ids(&self) -> Vec<NodeId> {
        self.miners.iter().map(Committee::id).collect()
    }

    pub fn sharder_ids(&self) -> Vec<NodeId> {
        self.sharders.iter().map(Committee::id).collect()
    }

    /// Sealed magic block listing every member
    pub fn magic_block(&self, number: u64, starting_round: u64, prev: Hash) -> MagicBlock {
        let mut mb = MagicBlock::new(number, starting_round, prev);
        for keypair in &self.miners {
            mb.miners.add_node(Node::new(
                keypair.get_public_key(),
                NodeType::Miner,
                MEMBER_STAKE,
                String::new(),
            ));
        }
        for keypair in &self.sharders {
            mb.sharders.add_node(Node::new(
                keypair.get_public_key(),
                NodeType::Sharder,
                MEMBER_STAKE,
                String::new(),
            ));
        }
        mb.n = self.miners.len();
        mb.t = (self.miners.len() * 2).div_ceil(3);
        mb.k = mb.t;
        mb.finalize_hash();
        mb
    }

    /// Genesis block of this committee over the state installed in `state`
    pub fn genesis(&self, state: &StateDriver, balances: &[(ClientId, Balance)]) -> Block {
        let root = state
            .genesis_state(balances)
            .expect("genesis state not written");
        Block::genesis(root, self.magic_block(1, 0, Hash::ZERO))
    }
}

/// Sealed block of `round` by `miner` on top of `prev`, keeping its state
pub fn child_block(prev: &Block, round: u64, miner: &KeyPair) -> Block {
    Block::new(
        prev.hash,
        round,
        Committee::id(miner),
        ChainTime::now().unwrap_or_default(),
    )
    .with_state(prev.client_state_hash)
    .seal()
}

/// Verification tickets of `signers` on `block`
pub fn notarize(block: &Block, signers: &[KeyPair]) -> Vec<VerificationTicket> {
    signers
        .iter()
        .map(|keypair| VerificationTicket::new(&block.hash, keypair))
        .collect()
}

pub fn test_state_config() -> StateConfig {
    StateConfig {
        smart_contract_timeout: ChainTime::from_millis(1000),
        fees_enabled: false,
        miners_sc_address: ClientId::from_label("miner_sc"),
        approved_minters: Vec::new(),
        sync_batch_size: 100,
    }
}

/// State driver over a memory node DB
pub fn memory_state() -> Arc<StateDriver> {
    Arc::new(StateDriver::new(
        test_state_config(),
        Arc::new(MemoryNodeDb::new()),
        Arc::new(NoopSmartContractExecutor),
    ))
}
