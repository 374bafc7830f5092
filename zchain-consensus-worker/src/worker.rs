// Copyright (c) 2022 The zchain developers

use crossbeam::channel::{bounded, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::{ChainChannels, ChainConfig, ChainController, ChainManager};
use zchain_models::Block;
use zchain_signature::KeyPair;
use zchain_versioning::VersioningConfig;

use crate::chain::{create_channels, Chain};
use crate::controller::ChainControllerImpl;
use crate::fetcher::BlockFetcher;
use crate::lfb_ticket::LfbTicketWorker;
use crate::manager::{ChainManagerImpl, WorkerHandle};
use crate::workers::{
    start_finalize_block_worker, start_finalize_round_worker, start_prune_state_worker,
    start_versions_worker,
};

fn start(
    workers: &mut Vec<WorkerHandle>,
    name: &'static str,
    spawn: impl FnOnce(Receiver<()>) -> Result<JoinHandle<()>, ConsensusError>,
) -> Result<(), ConsensusError> {
    let (stop, stop_rx) = bounded(1);
    let join_handle = spawn(stop_rx)?;
    workers.push(WorkerHandle {
        name,
        stop,
        join_handle,
    });
    Ok(())
}

/// Start the chain engine rooted at `genesis`
///
/// # Arguments
/// * `config`: chain engine settings
/// * `versioning_config`: version announcement settings
/// * `channels`: collaborators of the engine
/// * `keypair`: identity of this node
/// * `genesis`: genesis block, embedding the first magic block
///
/// # Returns
/// The controller to talk to the engine and the manager to stop it
pub fn start_chain_worker(
    config: ChainConfig,
    versioning_config: VersioningConfig,
    channels: ChainChannels,
    keypair: KeyPair,
    genesis: Block,
) -> Result<(Box<dyn ChainController>, Box<dyn ChainManager>), ConsensusError> {
    let (senders, receivers) = create_channels(&config)?;
    let chain = Arc::new(Chain::new(
        config,
        &versioning_config,
        channels,
        keypair,
        genesis,
        senders,
    )?);

    // stop order: producers of the finalization queues first
    let mut workers = Vec::new();
    start(&mut workers, "versions", |stop| {
        start_versions_worker(chain.clone(), versioning_config, stop)
    })?;
    start(&mut workers, "prune-state", |stop| {
        start_prune_state_worker(chain.clone(), stop)
    })?;
    start(&mut workers, "lfb-ticket", |stop| {
        LfbTicketWorker::new(
            chain.clone(),
            receivers.lfb_ticket_update,
            receivers.lfb_ticket_broadcast,
            receivers.lfb_ticket_command,
            stop,
        )
        .spawn()
    })?;
    start(&mut workers, "block-fetcher", |stop| {
        BlockFetcher::spawn(
            chain.clone(),
            receivers.fetch_previous,
            receivers.fetch_by_hash,
            stop,
        )
    })?;
    start(&mut workers, "finalize-round", |stop| {
        start_finalize_round_worker(chain.clone(), receivers.finalize_round, stop)
    })?;
    start(&mut workers, "finalize-block", |stop| {
        start_finalize_block_worker(chain.clone(), receivers.finalize_block, stop)
    })?;

    info!(
        "chain engine started as {:?} {}",
        chain.config.node_type, chain.self_id
    );
    let controller = ChainControllerImpl::new(chain);
    let manager = ChainManagerImpl { workers };
    Ok((Box::new(controller), Box::new(manager)))
}
