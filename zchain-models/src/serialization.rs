// Copyright (c) 2022 The zchain developers

use displaydoc::Display;
use nom::{
    error::{ContextError, ParseError},
    IResult,
};
use thiserror::Error;

/// Compact encoding errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// General error {0}
    GeneralError(String),
}

/// Compact binary decoder for `T`
pub trait Deserializer<T> {
    /// Decode a `T` from the head of `buffer`, returning the rest
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

/// Compact binary encoder for `T`
pub trait Serializer<T> {
    /// Append the encoding of `value` to `buffer`
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}
