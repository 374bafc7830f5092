// Copyright (c) 2022 The zchain developers

use std::sync::Arc;
use zchain_state::StateDriver;

use crate::{AfterFetcher, BlockStateHandler, ChainNetwork, FetchedNotarizedBlockHandler, ViewChanger};

/// Contains the collaborators of the chain engine
#[derive(Clone)]
pub struct ChainChannels {
    /// transport to the other nodes
    pub network: Arc<dyn ChainNetwork>,
    /// state of the blocks
    pub state: Arc<StateDriver>,
    /// told about finalized blocks
    pub block_state_handler: Arc<dyn BlockStateHandler>,
    /// committee changes
    pub view_changer: Arc<dyn ViewChanger>,
    /// post-processing of fetched blocks
    pub after_fetcher: Arc<dyn AfterFetcher>,
    /// told about fetched notarized blocks
    pub fetched_notarized_block_handler: Arc<dyn FetchedNotarizedBlockHandler>,
}
