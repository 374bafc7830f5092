// Copyright (c) 2022 The zchain developers

use nom::{
    bytes::complete::take,
    error::{context, ContextError, ParseError},
    number::complete::be_u64,
    sequence::tuple,
    IResult, Parser,
};
use zchain_hash::{Hash, HASH_SIZE_BYTES};
use zchain_models::{Balance, Deserializer, SerializeError, Serializer};

/// Value stored in the trie for each client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AccountState {
    /// spendable balance
    pub balance: Balance,
    /// round of the last change
    pub round: u64,
    /// transaction of the last change
    pub txn_hash: Hash,
}

/// Encoder for [`AccountState`]
#[derive(Default, Clone)]
pub struct AccountStateSerializer;

impl AccountStateSerializer {
    /// Creates a new serializer
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<AccountState> for AccountStateSerializer {
    fn serialize(&self, value: &AccountState, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.balance.to_raw().to_be_bytes());
        buffer.extend(value.round.to_be_bytes());
        buffer.extend(value.txn_hash.to_bytes());
        Ok(())
    }
}

/// Decoder for [`AccountState`]
#[derive(Default, Clone)]
pub struct AccountStateDeserializer;

impl AccountStateDeserializer {
    /// Creates a new deserializer
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<AccountState> for AccountStateDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], AccountState, E> {
        context(
            "Failed AccountState deserialization",
            tuple((
                context("Failed balance deserialization", be_u64),
                context("Failed round deserialization", be_u64),
                context("Failed txn_hash deserialization", take(HASH_SIZE_BYTES)),
            )),
        )
        .map(|(balance, round, txn_hash): (u64, u64, &[u8])| {
            let mut bytes = [0u8; HASH_SIZE_BYTES];
            bytes.copy_from_slice(txn_hash);
            AccountState {
                balance: Balance::from_raw(balance),
                round,
                txn_hash: Hash::from_bytes(&bytes),
            }
        })
        .parse(buffer)
    }
}
