// Copyright (c) 2022 The zchain developers
//! zchain node: loads the settings, starts the chain engine and runs until
//! interrupted
#![warn(unused_crate_dependencies)]
#[macro_use]
extern crate zchain_logging;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::{bounded, select, tick};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use zchain_consensus_exports::ChainChannels;
use zchain_consensus_worker::start_chain_worker;
use zchain_models::config::build_zchain_settings;
use zchain_models::{NodeId, NodeType};
use zchain_signature::KeyPair;
use zchain_state::{MemoryNodeDb, NoopSmartContractExecutor, StateDriver};

mod genesis;
mod handlers;
mod network;
mod settings;

use handlers::{CommitteeLogger, FetchLogger, LfbRecordKeeper};
use network::DetachedNetwork;
use settings::Settings;

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Miner,
    Sharder,
}

impl From<Role> for NodeType {
    fn from(role: Role) -> Self {
        match role {
            Role::Miner => NodeType::Miner,
            Role::Sharder => NodeType::Sharder,
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Settings file, replaces `ZCHAIN_CONFIG_PATH`
    #[arg(long)]
    config: Option<PathBuf>,
    /// Role of the node, replaces `node.node_type`
    #[arg(long, value_enum)]
    node_type: Option<Role>,
    /// 0: ERROR, 1: WARN, 2: INFO, 3: DEBUG, 4: TRACE, replaces `logging.level`
    #[arg(long)]
    log_level: Option<usize>,
}

fn setup_logging(level: usize) {
    let level = match level {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_keypair(settings: &Settings) -> Result<KeyPair> {
    match &settings.node.keypair {
        Some(encoded) => KeyPair::from_bs58_check(encoded).context("bad node keypair"),
        None => {
            let keypair = KeyPair::generate();
            warn!("no keypair configured, generated a new one");
            Ok(keypair)
        }
    }
}

fn run(settings: Settings, node_type: NodeType) -> Result<()> {
    let keypair = load_keypair(&settings)?;
    info!(
        "node {} starting as {:?}",
        NodeId::from_public_key(&keypair.get_public_key()),
        node_type
    );
    if let Some(record) = LfbRecordKeeper::load(&settings.node.lfb_record_path)? {
        // the state lives in memory, the chain restarts from genesis
        info!(
            "previous run finalized round {} ({})",
            record.round, record.hash
        );
    }

    let state = Arc::new(StateDriver::new(
        settings.state_config(),
        Arc::new(MemoryNodeDb::new()),
        Arc::new(NoopSmartContractExecutor),
    ));
    let magic_block = genesis::genesis_magic_block(&settings.genesis, &keypair, node_type)?;
    let genesis = genesis::genesis_block(&settings.genesis, &state, magic_block)?;
    info!(
        "genesis block {} with state {}",
        genesis.hash, genesis.client_state_hash
    );

    let fetch_logger = Arc::new(FetchLogger);
    let channels = ChainChannels {
        network: Arc::new(DetachedNetwork),
        state,
        block_state_handler: Arc::new(LfbRecordKeeper::new(
            settings.node.lfb_record_path.clone(),
            1,
        )),
        view_changer: Arc::new(CommitteeLogger),
        after_fetcher: fetch_logger.clone(),
        fetched_notarized_block_handler: fetch_logger,
    };
    let (controller, mut manager) = start_chain_worker(
        settings.chain_config(node_type),
        settings.versioning_config(),
        channels,
        keypair,
        genesis,
    )?;

    let (stop_tx, stop_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("could not install the interrupt handler")?;

    let stats_tick = tick(settings.node.stats_period.to_duration());
    loop {
        select! {
            recv(stop_rx) -> _ => {
                info!("interrupt signal received");
                break;
            }
            recv(stats_tick) -> _ => {
                let stats = controller.get_stats();
                info!(
                    "round {}, LFB round {}, {} finalized, {} rollbacks, syncing: {}",
                    stats.current_round,
                    stats.lfb_round,
                    stats.finalized_count,
                    stats.rollback_count,
                    controller.is_block_syncing()
                );
                zchain_trace!("node.stats", {
                    "current_round": stats.current_round,
                    "lfb_round": stats.lfb_round,
                    "finalized_count": stats.finalized_count,
                });
            }
        }
    }

    manager.stop();
    info!("node stopped");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("ZCHAIN_CONFIG_PATH", path);
    }
    let settings: Settings =
        build_zchain_settings("zchain-node", "ZCHAIN").context("could not load the settings")?;
    setup_logging(args.log_level.unwrap_or(settings.logging.level));

    let node_type = args
        .node_type
        .map(NodeType::from)
        .unwrap_or(settings.node.node_type);
    run(settings, node_type)
}
