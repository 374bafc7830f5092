// Copyright (c) 2022 The zchain developers

//! Fixtures shared by the tests of the chain crates: committees, block
//! builders, an in-memory network and recording collaborators.

mod capabilities;
mod committee;
mod network;

pub use capabilities::TestCapabilities;
pub use committee::{child_block, memory_state, notarize, test_state_config, Committee};
pub use network::FakeNetwork;

use parking_lot::{Condvar, Mutex};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing_subscriber::filter::LevelFilter;

static TRACING: Once = Once::new();

/// Install a debug level subscriber once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::prelude::*;
        let tracing_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_filter(LevelFilter::DEBUG);
        let _ = tracing_subscriber::registry().with(tracing_layer).try_init();
    });
}

pub trait TestUniverse {
    type ModuleController;
    type ForeignControllers;
    type Config;

    fn new(controllers: Self::ForeignControllers, config: Self::Config) -> Self;

    fn initialize(&self) {
        init_tracing();
    }

    fn get_module_controller(&self) -> &Self::ModuleController;
    fn get_module_controller_mut(&mut self) -> &mut Self::ModuleController;
}

/// Poll `predicate` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[derive(Default)]
pub struct Breakpoint {
    mutex: Mutex<bool>,
    condvar: Condvar,
}

impl Breakpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until triggered, returns false on timeout
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut started = self.mutex.lock();
        if !*started {
            let _ = self
                .condvar
                .wait_while_for(&mut started, |started| !*started, timeout);
        }
        *started
    }

    pub fn trigger(&self) {
        let mut started = self.mutex.lock();
        *started = true;
        self.condvar.notify_all();
    }
}
