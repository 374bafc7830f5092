// Copyright (c) 2022 The zchain developers

use crossbeam::channel::{bounded, Sender};
use std::sync::Arc;
use std::time::Duration;
use zchain_channel::receiver::ZchainReceiver;
use zchain_consensus_exports::ChainConfig;
use zchain_hash::Hash;
use zchain_models::{Block, LfbTicket, NodeType};
use zchain_test_framework::{child_block, wait_until, Committee, FakeNetwork};
use zchain_time::ChainTime;

use super::tools::{chain_config, TestChain};
use crate::chain::{Chain, ChainReceivers};
use crate::commands::{FetchKey, FetchRequest, FetchSource, LfbTicketCommand};
use crate::lfb_ticket::LfbTicketWorker;

/// Ticket engine of a sharder, driven by hand
struct SharderEngine {
    chain: Arc<Chain>,
    committee: Committee,
    genesis: Block,
    network: Arc<FakeNetwork>,
    fetch_by_hash: ZchainReceiver<FetchRequest>,
    worker: LfbTicketWorker,
    _stop: Sender<()>,
}

fn sharder_engine() -> SharderEngine {
    sharder_engine_with(chain_config(NodeType::Sharder))
}

fn sharder_engine_with(config: ChainConfig) -> SharderEngine {
    let committee = Committee::new(4, 2);
    let keypair = committee.sharders[0].clone();
    let TestChain {
        chain,
        receivers,
        committee,
        network,
        genesis,
        ..
    } = TestChain::new(committee, keypair, config);
    let ChainReceivers {
        lfb_ticket_update,
        lfb_ticket_broadcast,
        lfb_ticket_command,
        fetch_by_hash,
        ..
    } = receivers;
    let (stop, stop_rx) = bounded(1);
    let worker = LfbTicketWorker::new(
        chain.clone(),
        lfb_ticket_update,
        lfb_ticket_broadcast,
        lfb_ticket_command,
        stop_rx,
    );
    SharderEngine {
        chain,
        committee,
        genesis,
        network,
        fetch_by_hash,
        worker,
        _stop: stop,
    }
}

#[test]
fn test_lfb_ticket_drop() {
    let mut engine = sharder_engine();
    let (subscriber, notifications) = bounded(10);
    engine
        .worker
        .on_command(LfbTicketCommand::Subscribe(0, subscriber));

    engine
        .worker
        .on_update(LfbTicket::unsigned(100, Hash::compute_from(b"100")));
    assert_eq!(engine.worker.latest().round, 100);
    assert_eq!(notifications.try_recv().unwrap().round, 100);

    // behind the latest ticket
    let other_sharder = &engine.committee.sharders[1];
    let old = LfbTicket::new_signed(95, Hash::compute_from(b"95"), other_sharder);
    engine.worker.on_update(old);
    assert_eq!(engine.worker.latest().round, 100);
    assert!(notifications.try_recv().is_err());

    // ahead, but the block is unknown
    let block = child_block(&engine.genesis, 101, &engine.committee.miners[0]);
    let ticket = LfbTicket::new_signed(101, block.hash, other_sharder);
    engine.worker.on_update(ticket.clone());
    assert_eq!(engine.worker.latest().round, 100);
    assert!(notifications.try_recv().is_err());
    assert!(engine.chain.is_fetching(&FetchKey::Block(block.hash)));
    let request = engine.fetch_by_hash.try_recv().unwrap();
    assert_eq!(request.key, FetchKey::Block(block.hash));
    assert_eq!(request.round, 101);
    assert_eq!(request.source, FetchSource::Sharders);

    engine.chain.add_block(block).unwrap();
    engine.worker.on_update(ticket);
    assert_eq!(engine.worker.latest().round, 101);
    assert_eq!(engine.chain.latest_ticket.read().round, 101);
    assert_eq!(notifications.try_recv().unwrap().round, 101);
}

#[test]
fn test_lfb_ticket_broadcast_of_finalized_blocks() {
    let mut engine = sharder_engine();
    let self_id = engine.chain.self_id;

    let block = child_block(&engine.genesis, 3, &engine.committee.miners[0]);
    engine.worker.on_broadcast(block.clone());
    let latest = engine.worker.latest().clone();
    assert_eq!(latest.round, 3);
    assert_eq!(latest.lfb_hash, block.hash);
    assert!(latest.is_own);
    assert_eq!(latest.sharder_id, self_id);
    assert!(latest
        .verify(&engine.committee.sharders[0].get_public_key())
        .is_ok());

    let sent = engine.network.sent_tickets();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.round, 3);
    assert!(!sent[0].1.contains(&self_id));
    assert_eq!(sent[0].1.len(), 5);

    // an older finalized block is not announced
    let older = child_block(&engine.genesis, 2, &engine.committee.miners[1]);
    engine.worker.on_broadcast(older);
    assert_eq!(engine.network.sent_tickets().len(), 1);

    let (reply, answer) = bounded(1);
    engine.worker.on_command(LfbTicketCommand::GetLatest(reply));
    assert_eq!(answer.try_recv().unwrap().round, 3);
}

#[test]
fn test_lfb_ticket_unsubscribe() {
    let mut engine = sharder_engine();
    let (subscriber, notifications) = bounded(10);
    engine
        .worker
        .on_command(LfbTicketCommand::Subscribe(7, subscriber));
    engine
        .worker
        .on_command(LfbTicketCommand::Unsubscribe(7));
    engine
        .worker
        .on_update(LfbTicket::unsigned(10, Hash::compute_from(b"10")));
    assert_eq!(engine.worker.latest().round, 10);
    assert!(notifications.try_recv().is_err());
}

#[test]
fn test_duplicate_senders_are_merged() {
    let mut engine = sharder_engine();
    let (subscriber, notifications) = bounded(10);
    engine
        .worker
        .on_command(LfbTicketCommand::Subscribe(0, subscriber));
    let block = child_block(&engine.genesis, 5, &engine.committee.miners[0]);
    engine.chain.add_block(block.clone()).unwrap();
    let ticket = LfbTicket::new_signed(5, block.hash, &engine.committee.sharders[1]);
    let relays: Vec<_> = engine.committee.miners.iter().map(Committee::id).collect();

    // two copies of the same ticket drained together
    let mut first = ticket.clone();
    first.is_own = false;
    first.add_sender(relays[0]);
    engine
        .chain
        .add_lfb_ticket(ticket.clone(), relays[1])
        .unwrap();
    engine.worker.on_update(first.clone());
    assert_eq!(engine.worker.latest().round, 5);
    assert_eq!(engine.worker.latest().senders, vec![relays[0], relays[1]]);
    assert_eq!(notifications.try_recv().unwrap().round, 5);

    // a late copy only adds its sender
    let senders = engine.chain.senders.clone();
    let mut late = ticket.clone();
    late.is_own = false;
    late.add_sender(relays[2]);
    senders.lfb_ticket_update.try_send(late).unwrap();
    engine.worker.on_update(first);
    assert_eq!(
        engine.worker.latest().senders,
        vec![relays[0], relays[1], relays[2]]
    );
    assert_eq!(engine.chain.latest_ticket.read().senders.len(), 3);
    assert!(notifications.try_recv().is_err());
}

#[test]
fn test_sharder_rebroadcasts_latest_ticket() {
    let mut config = chain_config(NodeType::Sharder);
    config.lfb_ticket_rebroadcast_timeout = ChainTime::from_millis(20);
    let mut engine = sharder_engine_with(config);
    let block = child_block(&engine.genesis, 4, &engine.committee.miners[0]);
    engine.chain.add_block(block.clone()).unwrap();

    // received from another sharder, not minted here
    let mut ticket = LfbTicket::new_signed(4, block.hash, &engine.committee.sharders[1]);
    ticket.is_own = false;
    engine.worker.on_update(ticket);
    assert!(engine.network.sent_tickets().is_empty());

    engine.worker.rebroadcast();
    let sent = engine.network.sent_tickets();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.round, 4);
    assert_eq!(sent[0].0.lfb_hash, block.hash);

    let SharderEngine {
        worker,
        network,
        _stop: stop,
        ..
    } = engine;
    let handle = worker.spawn().unwrap();
    assert!(wait_until(Duration::from_secs(5), || network
        .sent_tickets()
        .len()
        >= 3));
    drop(stop);
    handle.join().unwrap();
    assert!(network
        .sent_tickets()
        .iter()
        .all(|(ticket, _)| ticket.round == 4));
}
