// Copyright (c) 2022 The zchain developers

use crossbeam::channel::{bounded, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use zchain_models::Transaction;
use zchain_time::ChainTime;

use crate::{StateContext, StateError};

/// Runs smart-contract transactions.
///
/// Implementations record their balance effects in the [`StateContext`] and
/// must return promptly once `cancel` is raised.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait SmartContractExecutor: Send + Sync {
    /// Execute `txn`, returning its output
    fn execute(
        &self,
        txn: &Transaction,
        ctx: &mut StateContext,
        cancel: &AtomicBool,
    ) -> Result<String, StateError>;
}

/// Executor of a node without smart contracts: calls succeed with no effect
#[derive(Default)]
pub struct NoopSmartContractExecutor;

impl SmartContractExecutor for NoopSmartContractExecutor {
    fn execute(
        &self,
        _txn: &Transaction,
        _ctx: &mut StateContext,
        _cancel: &AtomicBool,
    ) -> Result<String, StateError> {
        Ok(String::new())
    }
}

/// Run `executor` on a scoped thread and wait at most `timeout`. On timeout
/// the cancel flag is raised and the call fails with
/// `SmartContractExecutionCtxErr` once the execution returned.
/// A zero `timeout` runs the execution in place with no deadline.
pub(crate) fn execute_with_timeout(
    executor: &dyn SmartContractExecutor,
    txn: &Transaction,
    ctx: &mut StateContext,
    timeout: ChainTime,
) -> Result<String, StateError> {
    let cancel = AtomicBool::new(false);
    if timeout.to_millis() == 0 {
        return executor.execute(txn, ctx, &cancel);
    }
    let (tx, rx) = bounded(1);
    std::thread::scope(|scope| {
        let cancel_ref = &cancel;
        scope.spawn(move || {
            let result = executor.execute(txn, ctx, cancel_ref);
            let _ = tx.send(result);
        });
        match rx.recv_timeout(timeout.to_duration()) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::SeqCst);
                warn!("smart contract txn {} timed out, cancelled", txn.hash);
                Err(StateError::SmartContractExecutionCtxErr(format!(
                    "execution of txn {} exceeded {} ms",
                    txn.hash, timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(StateError::SmartContractExecution(
                format!("executor of txn {} stopped without result", txn.hash),
            )),
        }
    })
}
