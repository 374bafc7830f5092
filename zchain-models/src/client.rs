// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use zchain_hash::Hash;
use zchain_signature::PublicKey;

use crate::ModelsError;

/// Identity of a client account: the hash of its public key, or of a label for
/// smart-contract addresses.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ClientId(Hash);

/// Miners and sharders are clients too.
pub type NodeId = ClientId;

impl ClientId {
    /// Identity owned by `public_key`
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        ClientId(public_key.id_hash())
    }

    /// Well-known address, for instance a smart contract
    ///
    /// ```
    /// # use zchain_models::ClientId;
    /// assert_eq!(ClientId::from_label("miner_sc"), ClientId::from_label("miner_sc"));
    /// assert_ne!(ClientId::from_label("miner_sc"), ClientId::from_label("storage_sc"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        ClientId(Hash::compute_from(label.as_bytes()))
    }

    /// Wrap an existing hash
    pub const fn from_hash(hash: Hash) -> Self {
        ClientId(hash)
    }

    /// Underlying hash
    pub fn to_hash(&self) -> Hash {
        self.0
    }

    /// Raw bytes, used as the trie path of the account
    pub fn to_bytes(&self) -> &[u8; zchain_hash::HASH_SIZE_BYTES] {
        self.0.to_bytes()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ClientId(Hash::from_str(s)?))
    }
}
