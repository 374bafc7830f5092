// Copyright (c) 2022 The zchain developers

use displaydoc::Display;
use thiserror::Error;

/// Signature error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ZchainSignatureError {
    /// parsing error : {0}
    ParsingError(String),

    /// ed25519 engine error: {0}
    EngineError(#[from] ed25519_dalek::SignatureError),

    /// signature verification failed
    InvalidSignature,
}
