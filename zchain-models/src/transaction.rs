// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use zchain_hash::Hash;

use crate::{Balance, ClientId};

/// What a transaction does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// plain value transfer
    Send,
    /// data storage, no balance effect
    Data,
    /// smart-contract call
    SmartContract,
}

/// Outcome of applying a transaction to the state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// not applied yet
    #[default]
    Pending,
    /// applied
    Success,
    /// rejected
    Failed,
}

/// A client transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// content hash
    pub hash: Hash,
    /// sender
    pub client_id: ClientId,
    /// payee or called smart contract
    pub to_client_id: ClientId,
    /// value moved to `to_client_id`
    pub value: Balance,
    /// fee paid to the miners smart contract
    pub fee: Balance,
    /// kind
    pub txn_type: TransactionType,
    /// payload (data, or smart-contract call input)
    pub data: String,
    /// per-sender sequence number
    pub nonce: u64,
    /// outcome, set by the state driver
    #[serde(skip)]
    pub status: TransactionStatus,
}

impl Transaction {
    /// New pending transaction with its hash computed
    pub fn new(
        client_id: ClientId,
        to_client_id: ClientId,
        value: Balance,
        txn_type: TransactionType,
        nonce: u64,
    ) -> Self {
        let mut txn = Transaction {
            hash: Hash::ZERO,
            client_id,
            to_client_id,
            value,
            fee: Balance::zero(),
            txn_type,
            data: String::new(),
            nonce,
            status: TransactionStatus::Pending,
        };
        txn.hash = txn.compute_hash();
        txn
    }

    /// Set the fee, recomputing the hash
    #[must_use]
    pub fn with_fee(mut self, fee: Balance) -> Self {
        self.fee = fee;
        self.hash = self.compute_hash();
        self
    }

    /// Set the payload, recomputing the hash
    #[must_use]
    pub fn with_data(mut self, data: String) -> Self {
        self.data = data;
        self.hash = self.compute_hash();
        self
    }

    /// Hash over every field but the status
    pub fn compute_hash(&self) -> Hash {
        let kind: u8 = match self.txn_type {
            TransactionType::Send => 0,
            TransactionType::Data => 1,
            TransactionType::SmartContract => 2,
        };
        Hash::compute_from_tuple(&[
            self.client_id.to_bytes(),
            self.to_client_id.to_bytes(),
            &self.value.to_raw().to_be_bytes(),
            &self.fee.to_raw().to_be_bytes(),
            &[kind],
            self.data.as_bytes(),
            &self.nonce.to_be_bytes(),
        ])
    }
}
