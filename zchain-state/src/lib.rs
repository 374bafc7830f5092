// Copyright (c) 2022 The zchain developers
//! Account state of the chain: a versioned Merkle-Patricia trie over a node
//! DB, the transactional sub-tries used to apply transactions, and the
//! pruning of old trie versions.
#![warn(missing_docs)]

mod account;
mod config;
mod driver;
mod error;
mod executor;
mod mpt;
mod node;
mod node_db;
mod pruner;
mod state_context;

pub use account::{AccountState, AccountStateDeserializer, AccountStateSerializer};
pub use config::StateConfig;
pub use driver::{ReadSet, StateDriver, WriteSet};
pub use error::StateError;
pub use executor::{NoopSmartContractExecutor, SmartContractExecutor};
pub use mpt::{update_version, Mpt};
pub use node::{path_from_key, TrieNode, TrieNodeDeserializer, TrieNodeSerializer};
pub use node_db::{LevelNodeDb, MemoryNodeDb, NodeDb};
pub use pruner::{prune_target, PruneStats, StateNodesFetcher, StatePruner};
pub use state_context::StateContext;

#[cfg(any(test, feature = "test-exports"))]
pub use executor::MockSmartContractExecutor;
#[cfg(any(test, feature = "test-exports"))]
pub use pruner::MockStateNodesFetcher;
