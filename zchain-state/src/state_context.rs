// Copyright (c) 2022 The zchain developers

use zchain_hash::Hash;
use zchain_models::{Balance, ClientId, Mint, SignedTransfer, Transaction, Transfer};

use crate::StateError;

/// Effects requested while applying one transaction. They are checked here
/// and applied by the state driver once the transaction ran.
pub struct StateContext {
    block_hash: Hash,
    block_round: u64,
    txn_hash: Hash,
    txn_client_id: ClientId,
    txn_to_client_id: ClientId,
    txn_value: Balance,
    txn_fee: Balance,
    fees_enabled: bool,
    approved_minters: Vec<ClientId>,
    transfers: Vec<Transfer>,
    signed_transfers: Vec<SignedTransfer>,
    mints: Vec<Mint>,
}

impl StateContext {
    /// Context of `txn` inside the block `block_hash`
    pub fn new(
        block_hash: Hash,
        block_round: u64,
        txn: &Transaction,
        fees_enabled: bool,
        approved_minters: Vec<ClientId>,
    ) -> Self {
        StateContext {
            block_hash,
            block_round,
            txn_hash: txn.hash,
            txn_client_id: txn.client_id,
            txn_to_client_id: txn.to_client_id,
            txn_value: txn.value,
            txn_fee: txn.fee,
            fees_enabled,
            approved_minters,
            transfers: Vec::new(),
            signed_transfers: Vec::new(),
            mints: Vec::new(),
        }
    }

    /// Block being computed
    pub fn block_hash(&self) -> Hash {
        self.block_hash
    }

    /// Round of the block being computed
    pub fn block_round(&self) -> u64 {
        self.block_round
    }

    /// Transaction being applied
    pub fn txn_hash(&self) -> Hash {
        self.txn_hash
    }

    /// The payer must be the transaction sender or its payee
    pub fn add_transfer(&mut self, transfer: Transfer) -> Result<(), StateError> {
        if transfer.from != self.txn_client_id && transfer.from != self.txn_to_client_id {
            return Err(StateError::InvalidTransfer(format!(
                "{} is neither sender nor payee of txn {}",
                transfer.from, self.txn_hash
            )));
        }
        self.transfers.push(transfer);
        Ok(())
    }

    /// The payer signature must verify
    pub fn add_signed_transfer(&mut self, transfer: SignedTransfer) -> Result<(), StateError> {
        transfer
            .verify()
            .map_err(|err| StateError::InvalidTransfer(err.to_string()))?;
        self.signed_transfers.push(transfer);
        Ok(())
    }

    /// Only approved minters may mint
    pub fn add_mint(&mut self, mint: Mint) -> Result<(), StateError> {
        if !self.approved_minters.contains(&mint.minter) {
            return Err(StateError::InvalidMint(format!(
                "{} is not an approved minter",
                mint.minter
            )));
        }
        self.mints.push(mint);
        Ok(())
    }

    /// Transfers from the sender may not exceed the transaction value (plus the
    /// fee when fees are charged), and only the sender or the payee may pay.
    pub fn validate(&self) -> Result<(), StateError> {
        let mut amount = Balance::zero();
        for transfer in &self.transfers {
            if transfer.from == self.txn_client_id {
                amount = amount.checked_add(transfer.amount).ok_or_else(|| {
                    StateError::InvalidTransfer("transfers total overflows".to_string())
                })?;
            } else if transfer.from != self.txn_to_client_id {
                return Err(StateError::InvalidTransfer(format!(
                    "foreign payer {}",
                    transfer.from
                )));
            }
        }
        let mut total_value = self.txn_value;
        if self.fees_enabled {
            total_value = total_value.saturating_add(self.txn_fee);
        }
        if amount > total_value {
            return Err(StateError::InvalidTransfer(format!(
                "transfers total {} exceeds transaction value {}",
                amount, total_value
            )));
        }
        Ok(())
    }

    /// Recorded transfers
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Recorded signed transfers
    pub fn signed_transfers(&self) -> &[SignedTransfer] {
        &self.signed_transfers
    }

    /// Recorded mints
    pub fn mints(&self) -> &[Mint] {
        &self.mints
    }
}
