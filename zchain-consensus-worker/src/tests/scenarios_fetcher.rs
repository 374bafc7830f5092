// Copyright (c) 2022 The zchain developers

use assert_matches::assert_matches;
use zchain_consensus_exports::error::ConsensusError;
use zchain_hash::Hash;
use zchain_models::{LfbTicket, NodeType};
use zchain_test_framework::{child_block, Committee};

use super::tools::{chain_config, TestChain};
use crate::commands::{FetchKey, FetchRequest, FetchSource};

#[test]
fn test_fetch_missing_ancestors() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let b1 = test.notarized_child(&test.genesis, 1, 1);
    let b2 = test.notarized_child(&b1, 2, 2);
    let b3 = test.notarized_child(&b2, 3, 3);
    test.network.add_miner_block(b1.clone());
    test.network.add_miner_block(b2.clone());

    chain.add_block(b3.clone()).unwrap();
    assert!(!chain
        .blocks
        .get(&b3.hash)
        .unwrap()
        .state_status
        .is_computed());
    assert!(chain.is_fetching(&FetchKey::Block(b2.hash)));
    let request = test.receivers.fetch_previous.try_recv().unwrap();
    assert_eq!(request.round, 2);

    chain.fetch_previous(&request).unwrap();
    assert_eq!(test.network.block_requests(), vec![b2.hash, b1.hash]);
    for block in [&b1, &b2, &b3] {
        let cached = chain.blocks.get(&block.hash).unwrap();
        assert!(cached.state_status.is_computed());
        assert!(cached.is_notarized());
    }
    assert_eq!(
        test.capabilities.fetched(),
        vec![(b1.hash, true), (b2.hash, true)]
    );
    assert_eq!(chain.get_stats().fetch.from_miners, 2);
}

#[test]
fn test_fetch_previous_depth_limit() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let mut config = chain_config(NodeType::Miner);
    config.max_fetch_depth = 2;
    let test = TestChain::new(committee, keypair, config);

    let mut prev = test.genesis.clone();
    for round in 1..=4 {
        prev = child_block(&prev, round, &test.committee.miners[0]);
        test.network.add_miner_block(prev.clone());
    }
    let tip = child_block(&prev, 5, &test.committee.miners[0]);
    test.chain.add_block(tip).unwrap();
    let request = test.receivers.fetch_previous.try_recv().unwrap();
    assert_matches!(
        test.chain.fetch_previous(&request),
        Err(ConsensusError::PreviousBlockUnavailable(_))
    );
    assert!(!test.chain.blocks.contains(&prev.hash));
}

#[test]
fn test_fetch_falls_back_to_sharders() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let finalized = child_block(&test.genesis, 5, &test.committee.miners[1]);
    test.network.add_sharder_block(finalized.clone());
    let key = FetchKey::Block(finalized.hash);

    // above the latest ticket, sharders are not asked
    assert_matches!(
        chain.fetch_block(key, 5, FetchSource::MinersThenSharders),
        Err(ConsensusError::NotFound(_))
    );
    assert_eq!(test.network.block_requests().len(), 1);

    *chain.latest_ticket.write() = LfbTicket::unsigned(6, Hash::compute_from(b"lfb"));
    let fetched = chain
        .fetch_block(key, 5, FetchSource::MinersThenSharders)
        .unwrap();
    assert_eq!(fetched.hash, finalized.hash);

    assert_matches!(
        chain.fetch_block(FetchKey::NotarizedRound(4), 4, FetchSource::MinersThenSharders),
        Err(ConsensusError::NotFound(_))
    );
    let stats = chain.get_stats().fetch;
    assert_eq!(stats.from_miners, 0);
    assert_eq!(stats.from_sharders, 1);
    assert_eq!(stats.failed, 2);
}

#[test]
fn test_fetch_notarized_round() {
    let committee = Committee::new(4, 1);
    let keypair = committee.miners[0].clone();
    let test = TestChain::new(committee, keypair, chain_config(NodeType::Miner));
    let chain = &test.chain;

    let block = test.notarized_child(&test.genesis, 1, 2);
    test.network.add_notarized_block(block.clone());
    let request = FetchRequest {
        key: FetchKey::NotarizedRound(1),
        round: 1,
        source: FetchSource::MinersThenSharders,
    };
    let fetched = chain.fetch_by_key(&request).unwrap();
    assert_eq!(fetched.hash, block.hash);
    assert!(fetched.is_notarized());
    assert_eq!(test.capabilities.fetched_notarized(), vec![block.hash]);
    assert_eq!(chain.get_notarized_block(1).unwrap().hash, block.hash);

    // nobody has a notarized block of round 3
    let request = FetchRequest {
        key: FetchKey::NotarizedRound(3),
        round: 3,
        source: FetchSource::MinersThenSharders,
    };
    assert!(chain.fetch_by_key(&request).is_err());
}
