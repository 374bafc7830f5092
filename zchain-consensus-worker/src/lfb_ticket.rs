// Copyright (c) 2022 The zchain developers

//! LFB ticket engine: one thread owning the latest accepted ticket, fed by
//! received tickets and by finalized blocks to announce.

use crossbeam::channel::{after, never, Receiver, Sender, TrySendError};
use crossbeam::select;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};
use zchain_channel::receiver::ZchainReceiver;
use zchain_consensus_exports::error::ConsensusError;
use zchain_models::{Block, LfbTicket, NodeType};

use crate::chain::Chain;
use crate::commands::{FetchKey, FetchSource, LfbTicketCommand};

pub(crate) struct LfbTicketWorker {
    chain: Arc<Chain>,
    update: ZchainReceiver<LfbTicket>,
    broadcast: ZchainReceiver<Block>,
    commands: ZchainReceiver<LfbTicketCommand>,
    stop: Receiver<()>,
    latest: LfbTicket,
    subscribers: BTreeMap<u64, Sender<LfbTicket>>,
}

impl LfbTicketWorker {
    pub(crate) fn new(
        chain: Arc<Chain>,
        update: ZchainReceiver<LfbTicket>,
        broadcast: ZchainReceiver<Block>,
        commands: ZchainReceiver<LfbTicketCommand>,
        stop: Receiver<()>,
    ) -> Self {
        let latest = chain.latest_ticket.read().clone();
        LfbTicketWorker {
            chain,
            update,
            broadcast,
            commands,
            stop,
            latest,
            subscribers: BTreeMap::new(),
        }
    }

    pub(crate) fn spawn(self) -> Result<thread::JoinHandle<()>, ConsensusError> {
        let handle = thread::Builder::new()
            .name("lfb-ticket".into())
            .spawn(move || {
                let mut this = self;
                this.run();
            })?;
        Ok(handle)
    }

    fn run(&mut self) {
        let is_sharder = self.chain.config.node_type == NodeType::Sharder;
        let rebroadcast_timeout = self.chain.config.lfb_ticket_rebroadcast_timeout.to_duration();
        loop {
            // restarted by every event
            let rebroadcast = if is_sharder {
                after(rebroadcast_timeout)
            } else {
                never()
            };
            select! {
                recv(self.update) -> msg => {
                    self.update.update_metrics();
                    match msg {
                        Ok(ticket) => self.on_update(ticket),
                        Err(_) => break,
                    }
                },
                recv(self.broadcast) -> msg => {
                    self.broadcast.update_metrics();
                    match msg {
                        Ok(block) => self.on_broadcast(block),
                        Err(_) => break,
                    }
                },
                recv(self.commands) -> msg => {
                    self.commands.update_metrics();
                    match msg {
                        Ok(command) => self.on_command(command),
                        Err(_) => break,
                    }
                },
                recv(rebroadcast) -> _ => self.rebroadcast(),
                recv(self.stop) -> _ => break,
            }
        }
        info!("LFB ticket engine stopped at round {}", self.latest.round);
    }

    pub(crate) fn latest(&self) -> &LfbTicket {
        &self.latest
    }

    /// Keep the highest queued ticket and accept it if it moves the latest
    /// one forward. A sharder only accepts tickets for blocks it holds.
    /// Copies of the latest ticket only add their senders to it.
    pub(crate) fn on_update(&mut self, ticket: LfbTicket) {
        let mut queued = vec![ticket];
        while let Ok(next) = self.update.try_recv() {
            queued.push(next);
        }
        let mut senders_added = false;
        let mut best: Option<LfbTicket> = None;
        for ticket in queued {
            if same_ticket(&ticket, &self.latest) {
                for sender in &ticket.senders {
                    senders_added |= self.latest.add_sender(*sender);
                }
                continue;
            }
            match best.as_mut() {
                Some(current) if same_ticket(&ticket, current) => {
                    for sender in &ticket.senders {
                        current.add_sender(*sender);
                    }
                }
                Some(current) if ticket.round <= current.round => {}
                _ => best = Some(ticket),
            }
        }
        if senders_added {
            *self.chain.latest_ticket.write() = self.latest.clone();
        }
        let best = match best {
            Some(best) if best.round > self.latest.round => best,
            _ => return,
        };
        if best.is_signed()
            && self.chain.config.node_type == NodeType::Sharder
            && !self.chain.blocks.contains(&best.lfb_hash)
        {
            debug!(
                "LFB ticket {} refers to unknown block {}, fetching it",
                best.key(),
                best.lfb_hash
            );
            self.chain
                .async_fetch(FetchKey::Block(best.lfb_hash), best.round, FetchSource::Sharders);
            return;
        }
        self.set_latest(best);
    }

    /// Announce the highest finalized block queued
    pub(crate) fn on_broadcast(&mut self, block: Block) {
        let mut best = block;
        while let Ok(next) = self.broadcast.try_recv() {
            if next.round > best.round {
                best = next;
            }
        }
        if best.round <= self.latest.round {
            return;
        }
        let ticket = LfbTicket::new_signed(best.round, best.hash, self.chain.keypair());
        self.send(&ticket);
        self.set_latest(ticket);
    }

    pub(crate) fn on_command(&mut self, command: LfbTicketCommand) {
        match command {
            LfbTicketCommand::GetLatest(reply) => {
                let _ = reply.send(self.latest.clone());
            }
            LfbTicketCommand::Subscribe(id, sender) => {
                self.subscribers.insert(id, sender);
            }
            LfbTicketCommand::Unsubscribe(id) => {
                self.subscribers.remove(&id);
            }
        }
    }

    /// Send the latest ticket again
    pub(crate) fn rebroadcast(&self) {
        debug!("rebroadcasting LFB ticket {}", self.latest.key());
        self.send(&self.latest);
    }

    fn send(&self, ticket: &LfbTicket) {
        let nodes: Vec<_> = self
            .chain
            .current_members()
            .into_iter()
            .filter(|id| *id != self.chain.self_id)
            .collect();
        self.chain.channels.network.send_lfb_ticket(
            ticket,
            &nodes,
            self.chain.config.timeout_small_message,
        );
    }

    fn set_latest(&mut self, ticket: LfbTicket) {
        debug!("latest LFB ticket {} for block {}", ticket.key(), ticket.lfb_hash);
        *self.chain.latest_ticket.write() = ticket.clone();
        self.subscribers
            .retain(|_, subscriber| match subscriber.try_send(ticket.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
        zchain_trace!("chain.lfb_ticket", {
            "round": ticket.round,
            "block": ticket.lfb_hash.to_string(),
            "own": ticket.is_own
        });
        self.latest = ticket;
    }
}

fn same_ticket(a: &LfbTicket, b: &LfbTicket) -> bool {
    a.round == b.round && a.sharder_id == b.sharder_id && a.lfb_hash == b.lfb_hash
}
