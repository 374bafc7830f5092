// Copyright (c) 2022 The zchain developers

use std::{ops::Deref, sync::Arc, time::Instant};

use crossbeam::channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use prometheus::{Counter, Gauge};

/// Receiving half of a [`crate::ZchainChannel`].
#[derive(Clone)]
pub struct ZchainReceiver<T> {
    pub(crate) receiver: Receiver<T>,
    pub(crate) name: String,
    /// channel size
    pub(crate) actual_len: Gauge,
    /// total received messages
    pub(crate) received: Counter,
    /// reference counter to know how many receiver are cloned
    pub(crate) ref_counter: Arc<()>,
}

impl<T> Drop for ZchainReceiver<T> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.ref_counter) == 1 {
            // last receiver alive
            let _ = prometheus::unregister(Box::new(self.actual_len.clone()));
            let _ = prometheus::unregister(Box::new(self.received.clone()));
        }
    }
}

impl<T> ZchainReceiver<T> {
    /// Refresh the gauges after a message was taken out through `select!`
    pub fn update_metrics(&self) {
        self.actual_len.set(self.receiver.len() as f64);
        self.received.inc();
    }

    /// attempt to receive a message from the channel
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let msg = self.receiver.try_recv()?;
        self.update_metrics();
        Ok(msg)
    }

    /// block until a message arrives
    pub fn recv(&self) -> Result<T, RecvError> {
        let msg = self.receiver.recv()?;
        self.update_metrics();
        Ok(msg)
    }

    /// block until a message arrives or `deadline` is reached
    pub fn recv_deadline(&self, deadline: Instant) -> Result<T, RecvTimeoutError> {
        let msg = self.receiver.recv_deadline(deadline)?;
        self.update_metrics();
        Ok(msg)
    }

    /// Name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Deref for ZchainReceiver<T> {
    type Target = Receiver<T>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}
