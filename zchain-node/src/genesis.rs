// Copyright (c) 2022 The zchain developers

use anyhow::{bail, Context, Result};
use zchain_hash::Hash;
use zchain_models::{Balance, Block, ClientId, MagicBlock, Node, NodeType};
use zchain_signature::{KeyPair, PublicKey};
use zchain_state::StateDriver;

use crate::settings::GenesisSettings;

/// Stake of each genesis member
const GENESIS_STAKE: u64 = 1;

fn parse_keys(keys: &[String]) -> Result<Vec<PublicKey>> {
    keys.iter()
        .map(|key| {
            PublicKey::from_bs58_check(key).with_context(|| format!("bad genesis public key {}", key))
        })
        .collect()
}

/// First magic block. An empty committee in the settings stands for a
/// committee made of this node alone.
pub fn genesis_magic_block(
    settings: &GenesisSettings,
    keypair: &KeyPair,
    node_type: NodeType,
) -> Result<MagicBlock> {
    let mut miners = parse_keys(&settings.miners)?;
    let mut sharders = parse_keys(&settings.sharders)?;
    if miners.is_empty() && sharders.is_empty() {
        match node_type {
            NodeType::Miner => miners.push(keypair.get_public_key()),
            NodeType::Sharder => sharders.push(keypair.get_public_key()),
        }
    }
    if miners.is_empty() {
        bail!("the genesis committee has no miner");
    }

    let mut mb = MagicBlock::new(1, 0, Hash::ZERO);
    for public_key in miners {
        mb.miners
            .add_node(Node::new(public_key, NodeType::Miner, GENESIS_STAKE, String::new()));
    }
    for public_key in sharders {
        mb.sharders
            .add_node(Node::new(public_key, NodeType::Sharder, GENESIS_STAKE, String::new()));
    }
    mb.n = mb.miners.size();
    mb.t = (mb.n * 2).div_ceil(3);
    mb.k = mb.t;
    mb.finalize_hash();
    Ok(mb)
}

/// Write the initial balances and build the genesis block on top of them
pub fn genesis_block(
    settings: &GenesisSettings,
    state: &StateDriver,
    magic_block: MagicBlock,
) -> Result<Block> {
    let balances: Vec<(ClientId, Balance)> = settings
        .balances
        .iter()
        .map(|entry| {
            (
                ClientId::from_label(&entry.client),
                Balance::from_raw(entry.balance),
            )
        })
        .collect();
    let root = state.genesis_state(&balances)?;
    Ok(Block::genesis(root, magic_block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use zchain_models::NodeId;
    use zchain_models::config::{APPROVED_MINTERS, MINERS_SC_ADDRESS, STATE_SYNC_BATCH_SIZE};
    use zchain_state::{MemoryNodeDb, NoopSmartContractExecutor, StateConfig};
    use zchain_time::ChainTime;

    use crate::settings::GenesisBalance;

    fn empty_settings() -> GenesisSettings {
        GenesisSettings {
            miners: Vec::new(),
            sharders: Vec::new(),
            balances: Vec::new(),
        }
    }

    #[test]
    fn test_solo_committee() {
        let keypair = KeyPair::generate();
        let id = NodeId::from_public_key(&keypair.get_public_key());
        let mb = genesis_magic_block(&empty_settings(), &keypair, NodeType::Miner).unwrap();
        assert_eq!(mb.n, 1);
        assert_eq!(mb.t, 1);
        assert!(mb.miners.get(&id).is_some());
        assert_eq!(mb.sharders.size(), 0);

        // a sharder alone has nobody to produce blocks
        assert!(genesis_magic_block(&empty_settings(), &keypair, NodeType::Sharder).is_err());
    }

    #[test]
    fn test_committee_from_settings() {
        let miners: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let sharder = KeyPair::generate();
        let settings = GenesisSettings {
            miners: miners
                .iter()
                .map(|keypair| keypair.get_public_key().to_bs58_check())
                .collect(),
            sharders: vec![sharder.get_public_key().to_bs58_check()],
            balances: Vec::new(),
        };
        let mb = genesis_magic_block(&settings, &sharder, NodeType::Sharder).unwrap();
        assert_eq!(mb.n, 3);
        assert_eq!(mb.t, 2);
        assert_eq!(mb.sharders.size(), 1);

        let broken = GenesisSettings {
            miners: vec!["not a key".to_string()],
            ..settings
        };
        assert!(genesis_magic_block(&broken, &sharder, NodeType::Sharder).is_err());
    }

    #[test]
    fn test_genesis_balances() {
        let state = StateDriver::new(
            StateConfig {
                smart_contract_timeout: ChainTime::from_millis(1000),
                fees_enabled: false,
                miners_sc_address: *MINERS_SC_ADDRESS,
                approved_minters: APPROVED_MINTERS.clone(),
                sync_batch_size: STATE_SYNC_BATCH_SIZE,
            },
            Arc::new(MemoryNodeDb::new()),
            Arc::new(NoopSmartContractExecutor),
        );
        let settings = GenesisSettings {
            balances: vec![GenesisBalance {
                client: "faucet".to_string(),
                balance: 500,
            }],
            ..empty_settings()
        };
        let keypair = KeyPair::generate();
        let mb = genesis_magic_block(&settings, &keypair, NodeType::Miner).unwrap();
        let genesis = genesis_block(&settings, &state, mb).unwrap();
        assert_eq!(genesis.round, 0);
        assert_ne!(genesis.client_state_hash, Hash::ZERO);
        assert!(genesis.magic_block.is_some());
    }
}
