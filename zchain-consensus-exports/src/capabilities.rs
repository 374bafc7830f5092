// Copyright (c) 2022 The zchain developers

//! Collaborators the chain engine calls at fixed points of the protocol.
//! Each one is injected at construction and has a single method.

use zchain_models::Block;

use crate::error::ConsensusError;

/// Told about every finalized block, once, in increasing round order
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait BlockStateHandler: Send + Sync {
    /// `block` has been finalized and its state persisted
    fn update_finalized_block(&self, block: &Block) -> Result<(), ConsensusError>;
}

/// Applies committee changes before the LFB moves
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait ViewChanger: Send + Sync {
    /// `lfb` is about to become the latest finalized block. An error aborts the
    /// finalization and leaves the LFB untouched.
    fn view_change(&self, lfb: &Block) -> Result<(), ConsensusError>;
}

/// Post-processing of blocks obtained from other nodes
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait AfterFetcher: Send + Sync {
    /// `block` was fetched and added to the cache
    fn after_fetch(&self, block: &Block, is_notarized: bool) -> Result<(), ConsensusError>;
}

/// Told about notarized blocks fetched from miners
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait FetchedNotarizedBlockHandler: Send + Sync {
    /// A notarized block was fetched for its round
    fn notarized_block_fetched(&self, block: &Block);
}
