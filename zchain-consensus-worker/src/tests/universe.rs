// Copyright (c) 2022 The zchain developers

use std::sync::Arc;
use zchain_consensus_exports::{ChainConfig, ChainController, ChainManager};
use zchain_models::Block;
use zchain_signature::KeyPair;
use zchain_state::StateDriver;
use zchain_test_framework::{memory_state, Committee, FakeNetwork, TestCapabilities, TestUniverse};
use zchain_versioning::VersioningConfig;

use crate::start_chain_worker;

pub struct ChainForeignControllers {
    pub network: Arc<FakeNetwork>,
    pub capabilities: Arc<TestCapabilities>,
    pub state: Arc<StateDriver>,
}

impl ChainForeignControllers {
    pub fn new_with_fakes() -> Self {
        Self {
            network: Arc::new(FakeNetwork::new()),
            capabilities: TestCapabilities::new(),
            state: memory_state(),
        }
    }
}

pub struct ChainTestConfig {
    pub chain: ChainConfig,
    pub versioning: VersioningConfig,
    pub committee: Committee,
    pub keypair: KeyPair,
}

pub struct ChainTestUniverse {
    pub module_controller: Box<dyn ChainController>,
    module_manager: Option<Box<dyn ChainManager>>,
    pub genesis: Block,
}

impl TestUniverse for ChainTestUniverse {
    type ModuleController = Box<dyn ChainController>;
    type ForeignControllers = ChainForeignControllers;
    type Config = ChainTestConfig;

    fn new(controllers: Self::ForeignControllers, config: Self::Config) -> Self {
        let genesis = config.committee.genesis(&controllers.state, &[]);
        let channels = controllers
            .capabilities
            .channels(controllers.network.clone(), controllers.state.clone());
        let (module_controller, module_manager) = start_chain_worker(
            config.chain,
            config.versioning,
            channels,
            config.keypair,
            genesis.clone(),
        )
        .unwrap();
        let universe = Self {
            module_controller,
            module_manager: Some(module_manager),
            genesis,
        };
        universe.initialize();
        universe
    }

    fn get_module_controller(&self) -> &Self::ModuleController {
        &self.module_controller
    }

    fn get_module_controller_mut(&mut self) -> &mut Self::ModuleController {
        &mut self.module_controller
    }
}

impl ChainTestUniverse {
    pub fn stop(&mut self) {
        if let Some(mut manager) = self.module_manager.take() {
            manager.stop();
        }
    }
}

impl Drop for ChainTestUniverse {
    fn drop(&mut self) {
        self.stop();
    }
}
