// Copyright (c) 2022 The zchain developers

use displaydoc::Display;
use thiserror::Error;

/// Hash error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ZchainHashError {
    /// parsing error: {0}
    ParsingError(String),
    /// wrong hash length: expected {expected}, got {got}
    WrongLength {
        /// expected number of bytes
        expected: usize,
        /// received number of bytes
        got: usize,
    },
}
