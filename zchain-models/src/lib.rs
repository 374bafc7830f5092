// Copyright (c) 2022 The zchain developers
//! Data model shared by every zchain crate: blocks, rounds, magic blocks,
//! tickets, transactions and the node configuration constants.
#![warn(missing_docs)]
#[macro_use]
extern crate lazy_static;

pub use balance::Balance;
pub use block::{Block, BlockState, BlockSummary, StateStatus};
pub use client::{ClientId, NodeId};
pub use error::ModelsError;
pub use lfb_record::{LfbRoundRecord, LfbRoundRecordDeserializer, LfbRoundRecordSerializer};
pub use magic_block::{mb_round_offset, MagicBlock};
pub use node::{Node, NodePool, NodeType};
pub use round::{Round, RoundPhase};
pub use serialization::{Deserializer, SerializeError, Serializer};
pub use stats::ChainInfo;
pub use ticket::{LfbTicket, VerificationTicket};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use transfer::{Mint, SignedTransfer, Transfer};
pub use version::Version;

mod balance;
/// blocks and their aggregation state
pub mod block;
mod client;
/// configuration constants and settings loader
pub mod config;
/// models error
pub mod error;
mod lfb_record;
/// committee snapshots
pub mod magic_block;
mod node;
/// round aggregation state
pub mod round;
mod serialization;
mod stats;
mod ticket;
mod transaction;
mod transfer;
mod version;
