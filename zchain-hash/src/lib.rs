// Copyright (c) 2022 The zchain developers

#![warn(missing_docs)]
//! SHA-256 hashes used as identifiers across the chain.
pub use error::ZchainHashError;
pub use hash::Hash;
pub use settings::HASH_SIZE_BYTES;

mod error;
pub mod hash;
mod settings;
