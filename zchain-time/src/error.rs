// Copyright (c) 2022 The zchain developers

use displaydoc::Display;
use thiserror::Error;

/// Time error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum TimeError {
    /// Error converting
    ConversionError,
    /// Time overflow error
    TimeOverflowError,
    /// Time underflow error
    TimeUnderflowError,
    /// Could not parse duration {0}
    ParseError(String),
}
