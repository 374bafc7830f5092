// Copyright (c) 2022 The zchain developers

use assert_matches::assert_matches;
use zchain_consensus_exports::error::ConsensusError;
use zchain_hash::Hash;
use zchain_models::{Balance, ClientId, LfbTicket, NodeType};
use zchain_signature::KeyPair;
use zchain_state::StateError;
use zchain_test_framework::{child_block, Committee};

use super::tools::{chain_config, TestChain};

#[test]
fn test_lfb_from_sharders_ranking() {
    let committee = Committee::new(4, 3);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;
    *chain.latest_ticket.write() = LfbTicket::unsigned(5, Hash::compute_from(b"ticket"));

    let summary = |round: u64, miner: usize| {
        child_block(&test.genesis, round, &test.committee.miners[miner]).to_summary()
    };
    let stale = summary(4, 0);
    let single = summary(7, 0);
    let popular = summary(7, 1);
    let lower = summary(6, 0);
    test.network.set_lfb_replies(vec![
        stale,
        single.clone(),
        popular.clone(),
        lower.clone(),
        popular.clone(),
    ]);

    let ranked: Vec<Hash> = chain
        .get_lfb_from_sharders()
        .into_iter()
        .map(|summary| summary.hash)
        .collect();
    assert_eq!(ranked, vec![popular.hash, single.hash, lower.hash]);

    let bump = test.receivers.lfb_ticket_update.try_recv().unwrap();
    assert_eq!(bump.round, 7);
    assert_eq!(bump.lfb_hash, popular.hash);
    assert!(!bump.is_signed());
}

#[test]
fn test_is_block_syncing() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;
    assert!(!chain.is_block_syncing());

    // the network finalized far ahead of us
    *chain.latest_ticket.write() = LfbTicket::unsigned(10, Hash::compute_from(b"ticket"));
    assert!(chain.is_block_syncing());

    // caught up on rounds but the LFB lags
    *chain.latest_ticket.write() = LfbTicket::unsigned(0, test.genesis.hash);
    test.extend(&test.genesis, 1..=3);
    assert!(chain.is_block_syncing());
    chain.finalize_round(3).unwrap();
    assert!(!chain.is_block_syncing());
}

#[test]
fn test_add_lfb_ticket_checks_the_sharder() {
    let committee = Committee::new(4, 2);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;
    let sender = Committee::id(&test.committee.miners[1]);
    let lfb_hash = Hash::compute_from(b"lfb");

    assert_matches!(
        chain.add_lfb_ticket(LfbTicket::unsigned(3, lfb_hash), sender),
        Err(ConsensusError::InvalidTicket(_))
    );
    assert_matches!(
        chain.add_lfb_ticket(LfbTicket::new_signed(3, lfb_hash, &KeyPair::generate()), sender),
        Err(ConsensusError::InvalidTicket(_))
    );
    let mut forged = LfbTicket::new_signed(3, lfb_hash, &test.committee.sharders[0]);
    forged.round = 4;
    assert_matches!(
        chain.add_lfb_ticket(forged, sender),
        Err(ConsensusError::InvalidTicket(_))
    );
    assert!(test.receivers.lfb_ticket_update.try_recv().is_err());

    let ticket = LfbTicket::new_signed(3, lfb_hash, &test.committee.sharders[1]);
    chain.add_lfb_ticket(ticket, sender).unwrap();
    let queued = test.receivers.lfb_ticket_update.try_recv().unwrap();
    assert_eq!(queued.round, 3);
    assert_eq!(queued.senders, vec![sender]);
    assert!(!queued.is_own);
}

#[test]
fn test_get_balance_reads_the_lfb_state() {
    let alice = ClientId::from_label("alice");
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new_with(
        committee,
        keypair,
        chain_config(NodeType::Miner),
        &[(alice, Balance::from_raw(100))],
        |_| {},
    );
    let chain = &test.chain;

    assert_eq!(chain.get_balance(&alice).unwrap(), Balance::from_raw(100));
    assert_matches!(
        chain.get_balance(&ClientId::from_label("bob")),
        Err(ConsensusError::StateError(StateError::ValueNotPresent(_)))
    );

    test.extend(&test.genesis, 1..=3);
    chain.finalize_round(3).unwrap();
    test.drain_finalized_blocks();
    assert_eq!(chain.lfb().round, 2);
    assert_eq!(chain.get_balance(&alice).unwrap(), Balance::from_raw(100));
}
