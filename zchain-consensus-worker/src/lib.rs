// Copyright (c) 2022 The zchain developers
//! Chain engine of a committee based BFT node: block cache, rounds,
//! notarization, finalization with rollback, magic block view changes,
//! LFB tickets, block fetching and the worker threads driving them.

#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]
#[macro_use]
extern crate zchain_logging;

mod block_cache;
mod chain;
mod commands;
mod controller;
mod fetcher;
mod lfb_ticket;
mod magic_block_store;
mod manager;
mod round_table;
mod worker;
mod workers;

pub use controller::ChainControllerImpl;
pub use manager::ChainManagerImpl;
pub use worker::start_chain_worker;

#[cfg(test)]
mod tests;
