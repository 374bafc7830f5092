// Copyright (c) 2022 The zchain developers

use crossbeam::channel::Sender;
use zchain_hash::Hash;
use zchain_models::LfbTicket;

/// What a fetch looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FetchKey {
    /// a block by hash
    Block(Hash),
    /// any notarized block of a round
    NotarizedRound(u64),
}

/// Who is asked first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchSource {
    /// miners, then sharders if the round is below the latest ticket
    MinersThenSharders,
    /// sharders only, for finalized blocks
    Sharders,
}

#[derive(Debug, Clone)]
pub(crate) struct FetchRequest {
    pub key: FetchKey,
    pub round: u64,
    pub source: FetchSource,
}

/// Requests served by the LFB ticket worker
#[derive(Clone)]
pub(crate) enum LfbTicketCommand {
    GetLatest(Sender<LfbTicket>),
    Subscribe(u64, Sender<LfbTicket>),
    Unsubscribe(u64),
}
