// Copyright (c) 2022 The zchain developers

use assert_matches::assert_matches;
use more_asserts::assert_le;
use std::sync::Arc;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::MockViewChanger;
use zchain_models::NodeType;
use zchain_test_framework::{child_block, notarize, Committee};

use super::tools::{chain_config, TestChain};

#[test]
fn test_notarization_threshold() {
    let committee = Committee::new(10, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let block = child_block(&test.genesis, 1, &test.committee.miners[1]);
    chain.add_block(block.clone()).unwrap();
    let tickets = notarize(&block, &test.committee.miners);

    assert!(!chain
        .add_verification_tickets(block.hash, tickets[..6].to_vec())
        .unwrap());
    assert!(!chain.blocks.get(&block.hash).unwrap().is_notarized());

    assert!(chain
        .add_verification_tickets(block.hash, vec![tickets[6].clone()])
        .unwrap());
    assert!(chain.blocks.get(&block.hash).unwrap().is_notarized());

    // a duplicate changes nothing
    assert!(chain
        .merge_verification_tickets(&block.hash, &[tickets[2].clone()])
        .unwrap());
    let cached = chain.blocks.get(&block.hash).unwrap();
    assert_eq!(cached.verification_tickets_count(), 7);
    assert!(cached.is_notarized());
    assert_eq!(
        chain.get_notarized_block(1).unwrap().hash,
        block.hash,
        "notarized block of the round"
    );
}

#[test]
fn test_invalid_tickets_are_dropped() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let block = child_block(&test.genesis, 1, &test.committee.miners[1]);
    chain.add_block(block.clone()).unwrap();

    // signed by strangers, or signing another block
    let outsiders = Committee::new(4, 0);
    let mut tickets = notarize(&block, &outsiders.miners);
    tickets.extend(notarize(&test.genesis, &test.committee.miners));
    assert!(!chain.add_verification_tickets(block.hash, tickets).unwrap());
    assert_eq!(
        chain.blocks.get(&block.hash).unwrap().verification_tickets_count(),
        0
    );

    assert_matches!(
        chain.verify_notarization(&block, &[]),
        Err(ConsensusError::NoVerificationTickets)
    );
    let ticket = notarize(&block, &test.committee.miners[..1]).remove(0);
    assert_matches!(
        chain.verify_notarization(&block, &[ticket.clone(), ticket]),
        Err(ConsensusError::DuplicateTicketSignature(_))
    );
    assert_matches!(
        chain.verify_notarization(&block, &notarize(&block, &test.committee.miners[..2])),
        Err(ConsensusError::BlockNotNotarized(_))
    );
}

#[test]
fn test_forged_tickets_carried_by_a_block_are_dropped() {
    let committee = Committee::new(10, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let mut block = child_block(&test.genesis, 1, &test.committee.miners[1]);
    let outsiders = Committee::new(6, 0);
    block.merge_verification_tickets(&notarize(&block, &outsiders.miners));
    assert_eq!(block.verification_tickets_count(), 6);
    let cached = chain.add_block(block.clone()).unwrap();
    assert_eq!(cached.verification_tickets_count(), 0);

    // one valid ticket does not reach 67% of 10 miners
    let tickets = notarize(&block, &test.committee.miners);
    assert!(!chain
        .add_verification_tickets(block.hash, vec![tickets[0].clone()])
        .unwrap());
    let cached = chain.blocks.get(&block.hash).unwrap();
    assert_eq!(cached.verification_tickets_count(), 1);
    assert!(!cached.is_notarized());

    // valid tickets carried by a block are kept
    let mut copy = block.clone();
    copy.merge_verification_tickets(&tickets[1..7]);
    assert!(chain.add_block(copy).unwrap().is_notarized());
    assert_eq!(
        chain.blocks.get(&block.hash).unwrap().verification_tickets_count(),
        7
    );
}

#[test]
fn test_forward_finalization() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;
    assert_eq!(chain.lfb().hash, test.genesis.hash);

    let blocks = test.extend(&test.genesis, 1..=5);
    assert!(chain.compute_finalized_block(0).is_none());
    let fb = chain.compute_finalized_block(5).unwrap();
    assert_eq!(fb.hash, blocks[3].hash);

    chain.finalize_round(5).unwrap();
    assert_eq!(chain.lfb().hash, blocks[3].hash);
    assert_eq!(test.capabilities.view_changes(), vec![blocks[3].hash]);

    assert_eq!(test.drain_finalized_blocks(), 4);
    assert_eq!(test.capabilities.finalized_rounds(), vec![1, 2, 3, 4]);
    let stats = chain.get_stats();
    assert_eq!(stats.finalized_count, 4);
    assert_eq!(stats.lfb_round, 4);
    assert_eq!(stats.rollback_count, 0);
    assert_eq!(chain.lfb_record().round, 4);
    assert_eq!(chain.lfb_record().hash, blocks[3].hash);
    assert_eq!(chain.get_chain_info().len(), 4);
    assert_le!(
        chain.latest_deterministic_block().round,
        chain.lfb().round
    );

    // rounds at or below the LFB are left alone
    chain.finalize_round(4).unwrap();
    assert_eq!(test.drain_finalized_blocks(), 0);
}

#[test]
fn test_forward_candidate_too_far_behind_is_skipped() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let mut config = chain_config(NodeType::Miner);
    config.lfb_ticket_ahead = 2;
    let test = TestChain::new(committee, keypair, config);
    let chain = &test.chain;

    // two branches from B2 keep every round above it ambiguous
    let base = test.extend(&test.genesis, 1..=2);
    let mut left = base[1].clone();
    let mut right = base[1].clone();
    for round in 3..=6 {
        left = test.notarized_child(&left, round, 0);
        chain.add_notarized_block(left.clone()).unwrap();
        right = test.notarized_child(&right, round, 1);
        chain.add_notarized_block(right.clone()).unwrap();
    }
    assert_eq!(chain.compute_finalized_block(6).unwrap().hash, base[1].hash);

    // 4 rounds behind
    chain.finalize_round(6).unwrap();
    assert_eq!(chain.lfb().hash, test.genesis.hash);
    assert_eq!(test.drain_finalized_blocks(), 0);

    // 3 rounds behind
    chain.finalize_round(5).unwrap();
    assert_eq!(chain.lfb().hash, base[1].hash);
    assert_eq!(test.drain_finalized_blocks(), 2);
}

#[test]
fn test_rollback_to_common_ancestor() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let a = test.extend(&test.genesis, 1..=4);
    chain.finalize_round(4).unwrap();
    assert_eq!(chain.lfb().hash, a[2].hash);
    test.drain_finalized_blocks();

    // a fork from A2 gathers every notarization of round 5
    let b3 = test.notarized_child(&a[1], 3, 1);
    chain.add_notarized_block(b3.clone()).unwrap();
    let b4 = test.notarized_child(&b3, 4, 2);
    let b4_other = test.notarized_child(&b3, 4, 3);
    chain.add_notarized_block(b4.clone()).unwrap();
    chain.add_notarized_block(b4_other.clone()).unwrap();
    for (prev, miner) in [(&b4, 0), (&b4_other, 1)] {
        let b5 = test.notarized_child(prev, 5, miner);
        chain.add_notarized_block(b5).unwrap();
    }

    assert_eq!(chain.compute_finalized_block(5).unwrap().hash, b3.hash);
    assert_eq!(chain.common_ancestor(&a[2], &b3).unwrap().hash, a[1].hash);

    chain.finalize_round(5).unwrap();
    assert_eq!(chain.lfb().hash, a[1].hash);
    let stats = chain.get_stats();
    assert_eq!(stats.rollback_count, 1);
    assert_eq!(stats.longest_rollback, 1);
    assert_eq!(test.drain_finalized_blocks(), 0);
}

#[test]
fn test_view_change_failure_keeps_lfb() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new_with(
        committee,
        keypair,
        chain_config(NodeType::Miner),
        &[],
        |channels| {
            let mut view_changer = MockViewChanger::new();
            view_changer
                .expect_view_change()
                .returning(|_| Err(ConsensusError::InvalidEntity("refused".to_string())));
            channels.view_changer = Arc::new(view_changer);
        },
    );
    let chain = &test.chain;

    test.extend(&test.genesis, 1..=3);
    assert_matches!(
        chain.finalize_round(3),
        Err(ConsensusError::ViewChangeFailed(_))
    );
    assert_eq!(chain.lfb().hash, test.genesis.hash);
    assert_eq!(test.drain_finalized_blocks(), 0);
}

#[test]
fn test_finalization_waits_for_missing_parent() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    // B1 is only known by the network
    let b1 = test.notarized_child(&test.genesis, 1, 1);
    let b2 = test.notarized_child(&b1, 2, 2);
    let b3 = test.notarized_child(&b2, 3, 3);
    chain.add_notarized_block(b2.clone()).unwrap();
    chain.add_notarized_block(b3).unwrap();
    assert!(chain.compute_finalized_block(3).is_some());
    assert_matches!(
        chain.finalize_round(3),
        Err(ConsensusError::PreviousBlockUnavailable(_))
    );
    assert_eq!(chain.lfb().hash, test.genesis.hash);
    let request = test.receivers.fetch_previous.try_recv().unwrap();
    assert_eq!(request.round, 1);
}
