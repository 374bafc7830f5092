// Copyright (c) 2022 The zchain developers

use std::collections::BTreeMap;
use tracing::debug;
use zchain_consensus_exports::error::ConsensusError;
use zchain_hash::Hash;
use zchain_models::{Balance, BlockSummary, ClientId, LfbTicket, NodeId};
use zchain_state::StateError;

use super::Chain;

impl Chain {
    /// Sharders of the current magic block
    pub(crate) fn current_sharders(&self) -> Vec<NodeId> {
        self.magic_blocks
            .get(self.rounds.current_round())
            .map(|mb| mb.sharders.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every member of the current magic block
    pub(crate) fn current_members(&self) -> Vec<NodeId> {
        self.magic_blocks
            .get(self.rounds.current_round())
            .map(|mb| mb.all_node_ids().into_iter().collect())
            .unwrap_or_default()
    }

    /// LFB summaries reported by the sharders, best first: highest round,
    /// then most reported. Replies below the latest ticket are dropped.
    pub fn get_lfb_from_sharders(&self) -> Vec<BlockSummary> {
        let ticket_round = self.latest_ticket.read().round;
        let replies = self
            .channels
            .network
            .get_lfb_from_sharders(&self.current_sharders(), self.config.timeout_small_message);
        let mut tally: BTreeMap<Hash, (BlockSummary, usize)> = BTreeMap::new();
        for summary in replies {
            if summary.round < ticket_round {
                continue;
            }
            tally.entry(summary.hash).or_insert((summary, 0)).1 += 1;
        }
        let mut ranked: Vec<(BlockSummary, usize)> = tally.into_values().collect();
        ranked.sort_by(|(a, a_count), (b, b_count)| {
            b.round.cmp(&a.round).then(b_count.cmp(a_count))
        });
        if let Some((best, _)) = ranked.first() {
            if best.round > ticket_round {
                self.bump_lfb_ticket(best.round, best.hash);
            }
        }
        ranked.into_iter().map(|(summary, _)| summary).collect()
    }

    /// Kick the ticket engine with an unsigned ticket
    pub(crate) fn bump_lfb_ticket(&self, round: u64, lfb_hash: Hash) {
        if self
            .senders
            .lfb_ticket_update
            .try_send(LfbTicket::unsigned(round, lfb_hash))
            .is_err()
        {
            debug!("LFB ticket bump to round {} dropped", round);
        }
    }

    /// The node lags behind the network
    pub fn is_block_syncing(&self) -> bool {
        let current = self.rounds.current_round();
        let ticket_round = self.latest_ticket.read().round;
        let lfb_round = self.head.read().lfb.round;
        current < ticket_round
            || lfb_round + self.config.lfb_ticket_lag < ticket_round
            || lfb_round + self.config.lfb_ticket_ahead < current
    }

    /// Check a ticket received from `sender` and queue it for the ticket engine
    pub fn add_lfb_ticket(&self, mut ticket: LfbTicket, sender: NodeId) -> Result<(), ConsensusError> {
        if !ticket.is_signed() {
            return Err(ConsensusError::InvalidTicket(format!(
                "unsigned LFB ticket {}",
                ticket.key()
            )));
        }
        let mb = self.magic_block_for_round(ticket.round)?;
        let sharder = mb.sharders.get(&ticket.sharder_id).ok_or_else(|| {
            ConsensusError::InvalidTicket(format!(
                "LFB ticket {} from an unknown sharder",
                ticket.key()
            ))
        })?;
        ticket
            .verify(&sharder.public_key)
            .map_err(|err| ConsensusError::InvalidTicket(err.to_string()))?;
        ticket.add_sender(sender);
        ticket.is_own = false;
        self.senders
            .lfb_ticket_update
            .try_send(ticket)
            .map_err(|err| ConsensusError::ChannelError(format!("LFB ticket update: {}", err)))
    }

    /// Balance of a client in the LFB state
    pub fn get_balance(&self, client_id: &ClientId) -> Result<Balance, ConsensusError> {
        let lfb = self.lfb();
        let lfb = self.blocks.get(&lfb.hash).unwrap_or(lfb);
        if !self.channels.state.has_state(&lfb.hash) {
            return Err(StateError::StateNotComputed(format!("LFB {} has no state", lfb.hash)).into());
        }
        Ok(self.channels.state.get_balance(&lfb, client_id)?)
    }
}
