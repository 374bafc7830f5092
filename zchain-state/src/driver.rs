// Copyright (c) 2022 The zchain developers

use nom::error::VerboseError;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use zchain_hash::Hash;
use zchain_logging::zchain_trace;
use zchain_models::{
    Balance, Block, ClientId, Deserializer, Mint, Serializer, Transaction, TransactionStatus,
    TransactionType, Transfer,
};

use crate::executor::execute_with_timeout;
use crate::{
    AccountState, AccountStateDeserializer, AccountStateSerializer, LevelNodeDb, MemoryNodeDb,
    Mpt, NodeDb, SmartContractExecutor, StateConfig, StateContext, StateError,
};

/// Accounts read while applying a transaction
pub type ReadSet = BTreeSet<ClientId>;
/// Accounts written while applying a transaction
pub type WriteSet = BTreeSet<ClientId>;

/// Trie of one block, layered over the trie of its parent
#[derive(Clone)]
struct BlockStateEntry {
    mpt: Arc<Mutex<Mpt>>,
    level: Arc<LevelNodeDb>,
}

/// Drives the account state of every known block.
///
/// Each block owns a trie whose new nodes live in a memory level over the
/// level of its parent. Finalized blocks save their nodes into the state DB
/// and are rebased onto it.
pub struct StateDriver {
    config: StateConfig,
    state_db: Arc<dyn NodeDb>,
    executor: Arc<dyn SmartContractExecutor>,
    /// held for the whole of a state mutation or rebase
    state_mutex: Mutex<()>,
    block_states: RwLock<HashMap<Hash, BlockStateEntry>>,
}

impl StateDriver {
    /// Driver over `state_db`
    pub fn new(
        config: StateConfig,
        state_db: Arc<dyn NodeDb>,
        executor: Arc<dyn SmartContractExecutor>,
    ) -> Self {
        StateDriver {
            config,
            state_db,
            executor,
            state_mutex: Mutex::new(()),
            block_states: RwLock::new(HashMap::new()),
        }
    }

    /// Persistent node DB
    pub fn state_db(&self) -> Arc<dyn NodeDb> {
        self.state_db.clone()
    }

    /// Write the initial balances into the state DB, returns the genesis root
    pub fn genesis_state(&self, balances: &[(ClientId, Balance)]) -> Result<Hash, StateError> {
        let _guard = self.state_mutex.lock();
        let mut mpt = Mpt::new(Hash::ZERO, self.state_db.clone(), 0);
        for (client_id, balance) in balances {
            let account = AccountState {
                balance: *balance,
                ..Default::default()
            };
            put_account(&mut mpt, client_id, &account)?;
        }
        Ok(mpt.root())
    }

    /// Register the state of a block whose trie is already in the state DB
    /// (genesis, or a block synced from another node)
    pub fn install_state(&self, block: &Block) -> Result<(), StateError> {
        let level = Arc::new(LevelNodeDb::new(self.state_db.clone(), self.state_db.clone()));
        let mpt = Mpt::new(block.client_state_hash, level.clone(), block.round);
        if !mpt.is_root_present() {
            return Err(StateError::NodeNotFound(block.client_state_hash));
        }
        self.block_states.write().insert(
            block.hash,
            BlockStateEntry {
                mpt: Arc::new(Mutex::new(mpt)),
                level,
            },
        );
        Ok(())
    }

    fn entry(&self, block_hash: &Hash) -> Result<BlockStateEntry, StateError> {
        self.block_states
            .read()
            .get(block_hash)
            .cloned()
            .ok_or_else(|| StateError::StateNotComputed(format!("no state for block {}", block_hash)))
    }

    fn new_entry(&self, prev_hash: &Hash, round: u64) -> Result<BlockStateEntry, StateError> {
        let prev = self.entry(prev_hash)?;
        let prev_root = prev.mpt.lock().root();
        let level = Arc::new(LevelNodeDb::new(
            Arc::new(MemoryNodeDb::new()),
            prev.level.clone(),
        ));
        Ok(BlockStateEntry {
            mpt: Arc::new(Mutex::new(Mpt::new(prev_root, level.clone(), round))),
            level,
        })
    }

    /// Start the state of `block` from the state of its parent
    pub fn create_block_state(&self, block: &Block) -> Result<(), StateError> {
        let entry = self.new_entry(&block.prev_hash, block.round)?;
        self.block_states.write().insert(block.hash, entry);
        Ok(())
    }

    /// Is the state of `block_hash` known
    pub fn has_state(&self, block_hash: &Hash) -> bool {
        self.block_states.read().contains_key(block_hash)
    }

    /// Current root of the state of `block_hash`
    pub fn state_root(&self, block_hash: &Hash) -> Option<Hash> {
        self.block_states
            .read()
            .get(block_hash)
            .map(|entry| entry.mpt.lock().root())
    }

    /// Drop the state of a block leaving the cache
    pub fn forget(&self, block_hash: &Hash) {
        self.block_states.write().remove(block_hash);
    }

    /// Apply one transaction to the state of `block_hash`. On failure the
    /// block trie is untouched and the transaction is marked failed.
    pub fn update_state(
        &self,
        block_hash: &Hash,
        txn: &mut Transaction,
    ) -> Result<(ReadSet, WriteSet), StateError> {
        let _guard = self.state_mutex.lock();
        let entry = self.entry(block_hash)?;
        let mut mpt = entry.mpt.lock();
        self.apply_txn(&mut mpt, *block_hash, txn)
    }

    fn apply_txn(
        &self,
        mpt: &mut Mpt,
        block_hash: Hash,
        txn: &mut Transaction,
    ) -> Result<(ReadSet, WriteSet), StateError> {
        if !mpt.is_root_present() {
            txn.status = TransactionStatus::Failed;
            return Err(StateError::NodeNotFound(mpt.root()));
        }
        match self.apply_in_sub_trie(mpt, block_hash, txn) {
            Ok(sets) => {
                txn.status = TransactionStatus::Success;
                Ok(sets)
            }
            Err(err) => {
                txn.status = TransactionStatus::Failed;
                debug!("txn {} rejected in block {}: {}", txn.hash, block_hash, err);
                Err(err)
            }
        }
    }

    fn apply_in_sub_trie(
        &self,
        mpt: &mut Mpt,
        block_hash: Hash,
        txn: &Transaction,
    ) -> Result<(ReadSet, WriteSet), StateError> {
        let mut sub = mpt.sub_trie();
        let round = mpt.version();
        let mut ctx = StateContext::new(
            block_hash,
            round,
            txn,
            self.config.fees_enabled,
            self.config.approved_minters.clone(),
        );
        match txn.txn_type {
            TransactionType::SmartContract => {
                let output = execute_with_timeout(
                    self.executor.as_ref(),
                    txn,
                    &mut ctx,
                    self.config.smart_contract_timeout,
                )?;
                zchain_trace!("state.smart_contract.output", {
                    "txn": txn.hash.to_string(),
                    "output": output
                });
            }
            TransactionType::Data => {}
            TransactionType::Send => {
                ctx.add_transfer(Transfer::new(txn.client_id, txn.to_client_id, txn.value))?;
            }
        }
        if self.config.fees_enabled && !txn.fee.is_zero() {
            ctx.add_transfer(Transfer::new(
                txn.client_id,
                self.config.miners_sc_address,
                txn.fee,
            ))?;
        }
        ctx.validate()?;

        let mut read_set = ReadSet::new();
        let mut write_set = WriteSet::new();
        for transfer in ctx.transfers() {
            transfer_amount(&mut sub, transfer, txn, round, &mut read_set, &mut write_set)?;
        }
        for signed in ctx.signed_transfers() {
            transfer_amount(
                &mut sub,
                &signed.transfer,
                txn,
                round,
                &mut read_set,
                &mut write_set,
            )?;
        }
        for mint in ctx.mints() {
            // a failed mint does not fail the transaction
            if let Err(err) = mint_amount(&mut sub, mint, txn, round, &mut write_set) {
                warn!("mint to {} in txn {} failed: {}", mint.receiver, txn.hash, err);
            }
        }
        mpt.merge_changes(sub)?;
        Ok((read_set, write_set))
    }

    /// Apply the transactions of `block` over the state of its parent and
    /// check the resulting root against the block. Failed transactions are
    /// skipped. On mismatch the block state is discarded.
    pub fn compute_state(&self, block: &Block) -> Result<(), StateError> {
        let _guard = self.state_mutex.lock();
        let entry = self.new_entry(&block.prev_hash, block.round)?;
        let root = {
            let mut mpt = entry.mpt.lock();
            for txn in &block.txns {
                let mut txn = txn.clone();
                let _ = self.apply_txn(&mut mpt, block.hash, &mut txn);
            }
            mpt.root()
        };
        if root != block.client_state_hash {
            return Err(StateError::StateMismatch {
                expected: block.client_state_hash,
                computed: root,
            });
        }
        self.block_states.write().insert(block.hash, entry);
        Ok(())
    }

    /// Root obtained by applying `txns` at `round` over the state of
    /// `prev_hash`, without registering any block state. Statuses are set on
    /// the transactions.
    pub fn compute_root(
        &self,
        prev_hash: &Hash,
        round: u64,
        txns: &mut [Transaction],
    ) -> Result<Hash, StateError> {
        let _guard = self.state_mutex.lock();
        let entry = self.new_entry(prev_hash, round)?;
        let mut mpt = entry.mpt.lock();
        for txn in txns.iter_mut() {
            let _ = self.apply_txn(&mut mpt, Hash::ZERO, txn);
        }
        Ok(mpt.root())
    }

    /// Persist the nodes of a computed block state into the state DB
    pub fn save_changes(&self, block: &Block) -> Result<usize, StateError> {
        if !block.state_status.is_computed() {
            return Err(StateError::StateNotComputed(format!(
                "block {} state is {:?}",
                block.hash, block.state_status
            )));
        }
        let entry = self.entry(&block.hash)?;
        let saved = entry.mpt.lock().save_changes(self.state_db.as_ref());
        Ok(saved)
    }

    /// Point the block trie directly at the state DB
    pub fn rebase_state(&self, block_hash: &Hash) -> Result<(), StateError> {
        let _guard = self.state_mutex.lock();
        let entry = self.entry(block_hash)?;
        entry.level.rebase_current_db(self.state_db.clone());
        Ok(())
    }

    /// Balance of `client_id` in the state of `block`
    pub fn get_balance(&self, block: &Block, client_id: &ClientId) -> Result<Balance, StateError> {
        if !block.state_status.is_computed() {
            return Err(StateError::StateNotSynced(format!(
                "block {} state is {:?}",
                block.hash, block.state_status
            )));
        }
        let entry = self.entry(&block.hash)?;
        let mpt = entry.mpt.lock();
        get_account(&mpt, client_id)?
            .map(|account| account.balance)
            .ok_or_else(|| StateError::ValueNotPresent(client_id.to_string()))
    }
}

fn get_account(mpt: &Mpt, client_id: &ClientId) -> Result<Option<AccountState>, StateError> {
    match mpt.get(client_id.to_bytes())? {
        Some(bytes) => {
            let (_, account) = AccountStateDeserializer::new()
                .deserialize::<VerboseError<&[u8]>>(&bytes)
                .map_err(|err| StateError::CodecError(err.to_string()))?;
            Ok(Some(account))
        }
        None => Ok(None),
    }
}

fn put_account(mpt: &mut Mpt, client_id: &ClientId, account: &AccountState) -> Result<(), StateError> {
    let mut buffer = Vec::new();
    AccountStateSerializer::new()
        .serialize(account, &mut buffer)
        .map_err(|err| StateError::CodecError(err.to_string()))?;
    mpt.insert(client_id.to_bytes(), buffer)
}

/// Debit then credit. An account debited down to zero is deleted.
fn transfer_amount(
    mpt: &mut Mpt,
    transfer: &Transfer,
    txn: &Transaction,
    round: u64,
    read_set: &mut ReadSet,
    write_set: &mut WriteSet,
) -> Result<(), StateError> {
    if transfer.amount.is_zero() {
        return Ok(());
    }
    if transfer.from == transfer.to {
        return Err(StateError::InvalidTransfer(format!(
            "transfer from {} to itself",
            transfer.from
        )));
    }
    read_set.insert(transfer.from);
    let mut from_state = get_account(mpt, &transfer.from)?.unwrap_or_default();
    let remaining = from_state.balance.checked_sub(transfer.amount).ok_or_else(|| {
        StateError::InsufficientBalance(format!(
            "{} has {} and sends {}",
            transfer.from, from_state.balance, transfer.amount
        ))
    })?;
    read_set.insert(transfer.to);
    let mut to_state = get_account(mpt, &transfer.to)?.unwrap_or_default();

    from_state.balance = remaining;
    from_state.round = round;
    from_state.txn_hash = txn.hash;
    if from_state.balance.is_zero() {
        mpt.delete(transfer.from.to_bytes())?;
    } else {
        put_account(mpt, &transfer.from, &from_state)?;
    }
    write_set.insert(transfer.from);

    to_state.balance = to_state
        .balance
        .checked_add(transfer.amount)
        .ok_or_else(|| StateError::InvalidTransfer(format!("{} balance overflows", transfer.to)))?;
    to_state.round = round;
    to_state.txn_hash = txn.hash;
    put_account(mpt, &transfer.to, &to_state)?;
    write_set.insert(transfer.to);
    Ok(())
}

/// Credit only
fn mint_amount(
    mpt: &mut Mpt,
    mint: &Mint,
    txn: &Transaction,
    round: u64,
    write_set: &mut WriteSet,
) -> Result<(), StateError> {
    let mut to_state = get_account(mpt, &mint.receiver)?.unwrap_or_default();
    to_state.balance = to_state
        .balance
        .checked_add(mint.amount)
        .ok_or_else(|| StateError::InvalidMint(format!("{} balance overflows", mint.receiver)))?;
    to_state.round = round;
    to_state.txn_hash = txn.hash;
    put_account(mpt, &mint.receiver, &to_state)?;
    write_set.insert(mint.receiver);
    Ok(())
}
