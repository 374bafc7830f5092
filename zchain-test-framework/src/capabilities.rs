// Copyright (c) 2022 The zchain developers

use parking_lot::Mutex;
use std::sync::Arc;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::{
    AfterFetcher, BlockStateHandler, ChainChannels, ChainNetwork, FetchedNotarizedBlockHandler,
    ViewChanger,
};
use zchain_hash::Hash;
use zchain_models::Block;
use zchain_state::StateDriver;

/// Every collaborator of the chain engine in one recorder
#[derive(Default)]
pub struct TestCapabilities {
    finalized: Mutex<Vec<Block>>,
    view_changes: Mutex<Vec<Hash>>,
    fetched: Mutex<Vec<(Hash, bool)>>,
    fetched_notarized: Mutex<Vec<Hash>>,
}

impl TestCapabilities {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Chain collaborators backed by `self`
    pub fn channels(
        self: &Arc<Self>,
        network: Arc<dyn ChainNetwork>,
        state: Arc<StateDriver>,
    ) -> ChainChannels {
        ChainChannels {
            network,
            state,
            block_state_handler: self.clone(),
            view_changer: self.clone(),
            after_fetcher: self.clone(),
            fetched_notarized_block_handler: self.clone(),
        }
    }

    /// Finalized blocks, in the order they were handed over
    pub fn finalized(&self) -> Vec<Block> {
        self.finalized.lock().clone()
    }

    pub fn finalized_rounds(&self) -> Vec<u64> {
        self.finalized.lock().iter().map(|block| block.round).collect()
    }

    pub fn view_changes(&self) -> Vec<Hash> {
        self.view_changes.lock().clone()
    }

    pub fn fetched(&self) -> Vec<(Hash, bool)> {
        self.fetched.lock().clone()
    }

    pub fn fetched_notarized(&self) -> Vec<Hash> {
        self.fetched_notarized.lock().clone()
    }
}

impl BlockStateHandler for TestCapabilities {
    fn update_finalized_block(&self, block: &Block) -> Result<(), ConsensusError> {
        self.finalized.lock().push(block.clone());
        Ok(())
    }
}

impl ViewChanger for TestCapabilities {
    fn view_change(&self, lfb: &Block) -> Result<(), ConsensusError> {
        self.view_changes.lock().push(lfb.hash);
        Ok(())
    }
}

impl AfterFetcher for TestCapabilities {
    fn after_fetch(&self, block: &Block, is_notarized: bool) -> Result<(), ConsensusError> {
        self.fetched.lock().push((block.hash, is_notarized));
        Ok(())
    }
}

impl FetchedNotarizedBlockHandler for TestCapabilities {
    fn notarized_block_fetched(&self, block: &Block) {
        self.fetched_notarized.lock().push(block.hash);
    }
}
