// Copyright (c) 2022 The zchain developers
//! Signature management

#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]
mod error;
mod signature_impl;

pub use error::ZchainSignatureError;
pub use signature_impl::{KeyPair, PublicKey, Signature};
