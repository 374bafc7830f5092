// Copyright (c) 2022 The zchain developers

use displaydoc::Display;
use thiserror::Error;

/// Result alias defaulting to [`ModelsError`]
pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

/// Errors raised while building or checking model entities
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ModelsError {
    /// hash error: {0}
    HashError(#[from] zchain_hash::ZchainHashError),
    /// signature error: {0}
    SignatureError(#[from] zchain_signature::ZchainSignatureError),
    /// time error: {0}
    TimeError(#[from] zchain_time::TimeError),
    /// invalid entity: {0}
    InvalidEntity(String),
    /// invalid version identifier: {0}
    InvalidVersion(String),
    /// deserialization error: {0}
    DeserializeError(String),
    /// balance overflow
    BalanceOverflow,
}
