// Copyright (c) 2022 The zchain developers

use displaydoc::Display;
use thiserror::Error;
use zchain_hash::Hash;

/// State driver errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum StateError {
    /// insufficient balance: {0}
    InsufficientBalance(String),
    /// invalid transfer: {0}
    InvalidTransfer(String),
    /// invalid mint: {0}
    InvalidMint(String),
    /// value not present: {0}
    ValueNotPresent(String),
    /// trie node {0} not found
    NodeNotFound(Hash),
    /// smart contract execution context error: {0}
    SmartContractExecutionCtxErr(String),
    /// smart contract execution failed: {0}
    SmartContractExecution(String),
    /// computed state {computed} does not match block state {expected}
    StateMismatch {
        /// root of the block
        expected: Hash,
        /// root computed locally
        computed: Hash,
    },
    /// state not computed: {0}
    StateNotComputed(String),
    /// state not synced: {0}
    StateNotSynced(String),
    /// sub-trie started at {expected} but the trie is now at {actual}
    MptRootMismatch {
        /// root the sub-trie was layered over
        expected: Hash,
        /// current root of the trie
        actual: Hash,
    },
    /// node codec error: {0}
    CodecError(String),
    /// {0} trie nodes are still missing, sync pending
    PendingSync(usize),
}
