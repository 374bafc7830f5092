// Copyright (c) 2022 The zchain developers

use crossbeam::channel::Sender;
use std::thread::JoinHandle;
use tracing::{info, warn};
use zchain_consensus_exports::ChainManager;

/// A worker thread and the sender whose drop stops it
pub(crate) struct WorkerHandle {
    pub name: &'static str,
    pub stop: Sender<()>,
    pub join_handle: JoinHandle<()>,
}

/// Stops the chain threads, producers of the finalization queues first
pub struct ChainManagerImpl {
    /// in stop order
    pub(crate) workers: Vec<WorkerHandle>,
}

impl ChainManager for ChainManagerImpl {
    fn stop(&mut self) {
        info!("stopping chain workers...");
        for worker in self.workers.drain(..) {
            drop(worker.stop);
            if let Err(err) = worker.join_handle.join() {
                warn!("{} worker panicked: {:?}", worker.name, err);
            }
        }
        info!("chain workers stopped");
    }
}
