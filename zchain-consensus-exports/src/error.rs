// Copyright (c) 2022 The zchain developers
use displaydoc::Display;
use thiserror::Error;
use zchain_hash::Hash;
use zchain_models::{ModelsError, NodeId};
use zchain_state::StateError;
use zchain_time::TimeError;
use zchain_versioning::VersioningError;

/// Chain engine error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ConsensusError {
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// state error: {0}
    StateError(#[from] StateError),
    /// versioning error: {0}
    VersioningError(#[from] VersioningError),
    /// time error: {0}
    TimeError(#[from] TimeError),
    /// io error: {0}
    IOError(#[from] std::io::Error),
    /// invalid entity: {0}
    InvalidEntity(String),
    /// not found: {0}
    NotFound(String),
    /// previous block unavailable: {0}
    PreviousBlockUnavailable(String),
    /// insufficient chain: {0}
    InsufficientChain(String),
    /// block {0} is not notarized
    BlockNotNotarized(Hash),
    /// duplicate ticket signature from {0}
    DuplicateTicketSignature(NodeId),
    /// no verification tickets
    NoVerificationTickets,
    /// invalid ticket: {0}
    InvalidTicket(String),
    /// view change failed: {0}
    ViewChangeFailed(String),
    /// magic block update rejected: {0}
    MagicBlockUpdate(String),
    /// network error: {0}
    NetworkError(String),
    /// channel error: {0}
    ChannelError(String),
}
