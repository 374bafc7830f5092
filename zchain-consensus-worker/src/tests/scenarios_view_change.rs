// Copyright (c) 2022 The zchain developers

use assert_matches::assert_matches;
use zchain_consensus_exports::error::ConsensusError;
use zchain_hash::Hash;
use zchain_models::{Block, NodeType};
use zchain_signature::KeyPair;
use zchain_test_framework::{notarize, Committee};
use zchain_time::ChainTime;

use super::tools::{chain_config, TestChain};

#[test]
fn test_magic_block_hash_chain_violation() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair.clone(), chain_config(NodeType::Miner));
    let chain = &test.chain;

    // we are not part of MB#2, its link is not checked
    let second = Committee::new(4, 1);
    let mb2 = second.magic_block(2, 100, Hash::compute_from(b"X"));
    chain.update_magic_block(mb2.clone()).unwrap();
    assert_eq!(chain.magic_blocks.latest().unwrap().hash, mb2.hash);
    let known = chain.known_nodes();
    for id in second.miner_ids().iter().chain(test.committee.miner_ids().iter()) {
        assert!(known.contains(id));
    }

    let mut third = Committee::new(3, 1);
    third.miners.push(keypair);
    let mb3 = third.magic_block(3, 200, Hash::compute_from(b"Y"));
    assert_matches!(
        chain.update_magic_block(mb3),
        Err(ConsensusError::MagicBlockUpdate(_))
    );
    assert_eq!(chain.magic_blocks.latest().unwrap().hash, mb2.hash);
}

#[test]
fn test_magic_block_without_miners_rejected() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let mb1 = test.chain.magic_blocks.latest().unwrap();

    let empty = Committee::new(0, 1).magic_block(2, 100, mb1.hash);
    assert_matches!(
        test.chain.update_magic_block(empty),
        Err(ConsensusError::MagicBlockUpdate(_))
    );
    assert_eq!(test.chain.magic_blocks.latest().unwrap().hash, mb1.hash);
}

#[test]
fn test_finalized_magic_block_becomes_lfmb() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;
    let mb1 = chain.magic_blocks.latest().unwrap();
    let mb2 = test.committee.magic_block(2, 50, mb1.hash);

    let mut b1 = Block::new(
        test.genesis.hash,
        1,
        Committee::id(&test.committee.miners[1]),
        ChainTime::now().unwrap(),
    )
    .with_state(test.genesis.client_state_hash)
    .with_magic_block(mb2.clone())
    .seal();
    b1.merge_verification_tickets(&notarize(&b1, &test.committee.miners));
    chain.add_notarized_block(b1.clone()).unwrap();
    test.extend(&b1, 2..=3);

    chain.finalize_round(3).unwrap();
    assert_eq!(test.drain_finalized_blocks(), 2);
    assert_eq!(chain.get_stats().lfmb_number, 2);
    assert_eq!(chain.lfb_record().magic_block_number, 2);
    assert_eq!(
        chain.get_latest_finalized_magic_block(None).unwrap().hash,
        mb2.hash
    );
    assert!(chain.get_latest_finalized_magic_block(Some(mb2.hash)).is_none());
}

#[test]
fn test_lfmb_from_sharders_prefers_latest_committee() {
    let committee = Committee::new(4, 2);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let mb1 = test.chain.magic_blocks.latest().unwrap();
    let miner = &test.committee.miners[0];

    let carrying = |round: u64, starting_round: u64| {
        Block::new(test.genesis.hash, round, Committee::id(miner), ChainTime::from_millis(round))
            .with_magic_block(test.committee.magic_block(2, starting_round, mb1.hash))
            .seal()
    };
    let older = carrying(10, 100);
    let newer = carrying(5, 200);
    let plain = Block::new(test.genesis.hash, 30, Committee::id(miner), ChainTime::from_millis(30)).seal();
    test.network
        .set_lfmb_replies(vec![older, newer.clone(), newer.clone(), plain]);

    let lfmb = test.chain.get_lfmb_from_sharders(&mb1).unwrap();
    assert_eq!(lfmb.hash, newer.hash);

    test.network.set_lfmb_replies(Vec::new());
    assert!(test.chain.get_lfmb_from_sharders(&mb1).is_none());
}

#[test]
fn test_outsider_node_keeps_committee_index() {
    let committee = Committee::new(4, 1);
    let outsider = KeyPair::generate();
    let test = TestChain::new(committee, outsider, chain_config(NodeType::Miner));
    for round in [0, 3, 10, 1000] {
        assert_eq!(test.chain.magic_block_for_round(round).unwrap().magic_block_number, 1);
    }
    assert_eq!(test.chain.num_generators(1), 2);
}
