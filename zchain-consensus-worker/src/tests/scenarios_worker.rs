// Copyright (c) 2022 The zchain developers

use assert_matches::assert_matches;
use more_asserts::assert_ge;
use std::time::Duration;
use zchain_consensus_exports::error::ConsensusError;
use zchain_models::{Block, NodeType, Version};
use zchain_signature::KeyPair;
use zchain_test_framework::{child_block, notarize, wait_until, Committee, TestUniverse};

use super::tools::{chain_config, versioning_config};
use super::universe::{ChainForeignControllers, ChainTestConfig, ChainTestUniverse};

const WAIT: Duration = Duration::from_secs(5);

fn notarized(prev: &Block, round: u64, committee: &Committee) -> Block {
    let miner = &committee.miners[round as usize % committee.miners.len()];
    let mut block = child_block(prev, round, miner);
    block.merge_verification_tickets(&notarize(&block, &committee.miners));
    block
}

fn universe(
    committee: &Committee,
    keypair: KeyPair,
    node_type: NodeType,
) -> (ChainTestUniverse, ChainForeignHandles) {
    let foreign = ChainForeignControllers::new_with_fakes();
    let handles = ChainForeignHandles {
        network: foreign.network.clone(),
        capabilities: foreign.capabilities.clone(),
    };
    let universe = ChainTestUniverse::new(
        foreign,
        ChainTestConfig {
            chain: chain_config(node_type),
            versioning: versioning_config(),
            committee: committee.clone(),
            keypair,
        },
    );
    (universe, handles)
}

struct ChainForeignHandles {
    network: std::sync::Arc<zchain_test_framework::FakeNetwork>,
    capabilities: std::sync::Arc<zchain_test_framework::TestCapabilities>,
}

#[test]
fn test_worker_finalizes_notarized_rounds() {
    let committee = Committee::new(4, 1);
    let (mut universe, handles) = universe(&committee, committee.miners[0].clone(), NodeType::Miner);
    let controller = universe.get_module_controller().clone_box();

    let mut prev = universe.genesis.clone();
    for round in 1..=5 {
        let block = notarized(&prev, round, &committee);
        controller.add_notarized_block(block.clone()).unwrap();
        prev = block;
    }
    assert!(wait_until(WAIT, || handles.capabilities.finalized_rounds()
        == vec![1, 2, 3, 4]));
    assert_eq!(controller.get_latest_finalized_block().round, 4);
    assert_eq!(controller.get_stats().finalized_count, 4);
    assert_eq!(controller.get_notarized_block(5).unwrap().hash, prev.hash);
    assert_eq!(controller.get_block(&prev.hash).unwrap().round, 5);
    assert_eq!(controller.get_chain_info().len(), 4);
    assert!(!controller.is_block_syncing());

    universe.stop();
    assert_eq!(handles.capabilities.finalized_rounds(), vec![1, 2, 3, 4]);
}

#[test]
fn test_controller_notarizes_from_tickets() {
    let committee = Committee::new(4, 1);
    let (_universe, handles) = universe(&committee, committee.miners[0].clone(), NodeType::Miner);
    let controller = _universe.get_module_controller();

    let b1 = child_block(&_universe.genesis, 1, &committee.miners[1]);
    controller.add_block(b1.clone()).unwrap();
    assert!(!controller
        .add_verification_tickets(b1.hash, notarize(&b1, &committee.miners[..2]))
        .unwrap());
    assert!(controller
        .add_verification_tickets(b1.hash, notarize(&b1, &committee.miners[2..]))
        .unwrap());

    let b2 = notarized(&b1, 2, &committee);
    assert!(controller.add_block(b2).unwrap().is_notarized());
    assert!(wait_until(WAIT, || handles.capabilities.finalized_rounds() == vec![1]));
    assert_eq!(controller.get_latest_finalized_block().hash, b1.hash);
}

#[test]
fn test_sharder_announces_lfb_tickets() {
    let committee = Committee::new(4, 2);
    let keypair = committee.sharders[0].clone();
    let self_id = Committee::id(&keypair);
    let (_universe, handles) = universe(&committee, keypair, NodeType::Sharder);
    let controller = _universe.get_module_controller();
    let subscription = controller.subscribe_lfb_tickets().unwrap();

    let mut prev = _universe.genesis.clone();
    for round in 1..=3 {
        let block = notarized(&prev, round, &committee);
        controller.add_notarized_block(block.clone()).unwrap();
        prev = block;
    }
    assert!(wait_until(WAIT, || handles.capabilities.finalized_rounds() == vec![1, 2]));

    let first = subscription.receiver.recv_timeout(WAIT).unwrap();
    assert_ge!(first.round, 1);
    assert_eq!(first.sharder_id, self_id);
    assert!(first.is_signed());
    assert!(wait_until(WAIT, || controller
        .get_latest_lfb_ticket()
        .map_or(false, |ticket| ticket.round == 2)));
    assert!(wait_until(WAIT, || !handles.network.sent_tickets().is_empty()));
    controller.unsubscribe_lfb_tickets(subscription.id);
}

#[test]
fn test_versions_are_announced_and_tallied() {
    let committee = Committee::new(4, 1);
    let (_universe, handles) = universe(&committee, committee.miners[0].clone(), NodeType::Miner);
    let controller = _universe.get_module_controller();
    let version = Version::new(1, 0, 0);

    assert!(wait_until(WAIT, || !handles.network.sent_versions().is_empty()));
    let (sent, nodes) = handles.network.sent_versions()[0].clone();
    assert_eq!(sent, version);
    assert_eq!(nodes.len(), 4);

    // 5 members, 80%: 4 reports are needed
    assert_eq!(controller.get_consensus_version(), None);
    for miner in &committee.miners[1..3] {
        controller
            .add_node_version(Committee::id(miner), version)
            .unwrap();
    }
    assert_eq!(controller.get_consensus_version(), None);
    controller
        .add_node_version(Committee::id(&committee.sharders[0]), version)
        .unwrap();
    assert!(wait_until(WAIT, || controller.get_consensus_version()
        == Some(version)));

    assert_matches!(
        controller.add_node_version(Committee::id(&KeyPair::generate()), version),
        Err(ConsensusError::VersioningError(_))
    );
}
