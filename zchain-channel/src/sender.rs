// Copyright (c) 2022 The zchain developers

use std::{ops::Deref, time::Duration};

use crossbeam::channel::{SendError, SendTimeoutError, Sender, TrySendError};
use prometheus::Gauge;

/// Sending half of a [`crate::ZchainChannel`].
#[derive(Clone, Debug)]
pub struct ZchainSender<T> {
    pub(crate) sender: Sender<T>,
    pub(crate) name: String,
    /// channel size
    pub(crate) actual_len: Gauge,
}

impl<T> ZchainSender<T> {
    /// Send a message to the channel, blocking while it is full
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        self.sender.send(msg)?;
        self.actual_len.inc();
        Ok(())
    }

    /// Send a message, giving up once `duration` elapsed
    pub fn send_timeout(&self, msg: T, duration: Duration) -> Result<(), SendTimeoutError<T>> {
        self.sender.send_timeout(msg, duration)?;
        self.actual_len.inc();
        Ok(())
    }

    /// Send a message if there is room for it
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        self.sender.try_send(msg)?;
        self.actual_len.inc();
        Ok(())
    }

    /// Name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Deref for ZchainSender<T> {
    type Target = Sender<T>;

    fn deref(&self) -> &Self::Target {
        &self.sender
    }
}
