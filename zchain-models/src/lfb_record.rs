// Copyright (c) 2022 The zchain developers

use nom::{
    bytes::complete::take,
    error::{context, ContextError, ParseError},
    number::complete::be_u64,
    sequence::tuple,
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use zchain_hash::{Hash, HASH_SIZE_BYTES};

use crate::{Deserializer, SerializeError, Serializer};

/// Persisted pointer to the latest finalized block, stored under
/// [`crate::config::LFB_ROUND_KEY`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfbRoundRecord {
    /// round of the block
    pub round: u64,
    /// hash of the block
    pub hash: Hash,
    /// number of the magic block governing it
    pub magic_block_number: u64,
}

/// Encoder for [`LfbRoundRecord`]
#[derive(Default, Clone)]
pub struct LfbRoundRecordSerializer;

impl LfbRoundRecordSerializer {
    /// Creates a new serializer
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<LfbRoundRecord> for LfbRoundRecordSerializer {
    /// ```
    /// # use zchain_models::{LfbRoundRecord, LfbRoundRecordSerializer, Serializer};
    /// # use zchain_hash::Hash;
    /// let record = LfbRoundRecord { round: 7, hash: Hash::ZERO, magic_block_number: 1 };
    /// let mut buffer = Vec::new();
    /// LfbRoundRecordSerializer::new().serialize(&record, &mut buffer).unwrap();
    /// assert_eq!(buffer.len(), 48);
    /// ```
    fn serialize(&self, value: &LfbRoundRecord, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.round.to_be_bytes());
        buffer.extend(value.hash.to_bytes());
        buffer.extend(value.magic_block_number.to_be_bytes());
        Ok(())
    }
}

/// Decoder for [`LfbRoundRecord`]
#[derive(Default, Clone)]
pub struct LfbRoundRecordDeserializer;

impl LfbRoundRecordDeserializer {
    /// Creates a new deserializer
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<LfbRoundRecord> for LfbRoundRecordDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], LfbRoundRecord, E> {
        context(
            "Failed LfbRoundRecord deserialization",
            tuple((
                context("Failed round deserialization", be_u64),
                context("Failed hash deserialization", take(HASH_SIZE_BYTES)),
                context("Failed magic_block_number deserialization", be_u64),
            )),
        )
        .map(|(round, hash, magic_block_number): (u64, &[u8], u64)| {
            let mut bytes = [0u8; HASH_SIZE_BYTES];
            bytes.copy_from_slice(hash);
            LfbRoundRecord {
                round,
                hash: Hash::from_bytes(&bytes),
                magic_block_number,
            }
        })
        .parse(buffer)
    }
}
