// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use zchain_hash::Hash;
use zchain_signature::{KeyPair, PublicKey, Signature};

use crate::{Balance, ClientId, ModelsError};

/// Move `amount` from `from` to `to`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// payer
    pub from: ClientId,
    /// payee
    pub to: ClientId,
    /// amount moved
    pub amount: Balance,
}

impl Transfer {
    /// New transfer
    pub fn new(from: ClientId, to: ClientId, amount: Balance) -> Self {
        Transfer { from, to, amount }
    }

    /// Hash signed by the payer of a [`SignedTransfer`]
    pub fn compute_hash(&self) -> Hash {
        Hash::compute_from_tuple(&[
            self.from.to_bytes(),
            self.to.to_bytes(),
            &self.amount.to_raw().to_be_bytes(),
        ])
    }
}

/// Transfer authorized by the payer's signature rather than by the transaction sender
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    /// the transfer
    pub transfer: Transfer,
    /// payer key
    pub public_key: PublicKey,
    /// payer signature over the transfer hash
    pub signature: Signature,
}

impl SignedTransfer {
    /// Sign `transfer` with the payer key
    pub fn new(transfer: Transfer, keypair: &KeyPair) -> Self {
        SignedTransfer {
            signature: keypair.sign(&transfer.compute_hash()),
            public_key: keypair.get_public_key(),
            transfer,
        }
    }

    /// The key must belong to the payer and the signature must match
    pub fn verify(&self) -> Result<(), ModelsError> {
        if ClientId::from_public_key(&self.public_key) != self.transfer.from {
            return Err(ModelsError::InvalidEntity(
                "signed transfer key does not match payer".to_string(),
            ));
        }
        self.public_key
            .verify_signature(&self.transfer.compute_hash(), &self.signature)?;
        Ok(())
    }
}

/// Credit created by an approved minter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    /// minting smart contract
    pub minter: ClientId,
    /// credited client
    pub receiver: ClientId,
    /// minted amount
    pub amount: Balance,
}

impl Mint {
    /// New mint
    pub fn new(minter: ClientId, receiver: ClientId, amount: Balance) -> Self {
        Mint {
            minter,
            receiver,
            amount,
        }
    }
}
