// Copyright (c) 2022 The zchain developers
//! Definition and exports of the chain engine types, traits and errors.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod capabilities;
mod channels;
mod controller_trait;
mod network;
mod settings;
mod types;

pub mod error;

pub use capabilities::{
    AfterFetcher, BlockStateHandler, FetchedNotarizedBlockHandler, ViewChanger,
};
pub use channels::ChainChannels;
pub use controller_trait::{ChainController, ChainManager};
pub use network::ChainNetwork;
pub use settings::ChainConfig;
pub use types::{ChainStats, FeeStats, FetchStats, LfbTicketSubscription, MinerStats};

#[cfg(feature = "test-exports")]
pub use capabilities::{
    MockAfterFetcher, MockBlockStateHandler, MockFetchedNotarizedBlockHandler, MockViewChanger,
};
#[cfg(feature = "test-exports")]
pub use controller_trait::MockChainController;
#[cfg(feature = "test-exports")]
pub use network::MockChainNetwork;

/// Exports related to tests as mocks and configurations
#[cfg(feature = "test-exports")]
pub mod test_exports;
