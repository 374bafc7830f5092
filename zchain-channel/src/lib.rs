// Copyright (c) 2022 The zchain developers
//! Named crossbeam channels reporting their fill level to prometheus.
#![warn(missing_docs)]

use std::sync::Arc;

use receiver::ZchainReceiver;
use sender::ZchainSender;

pub mod receiver;
pub mod sender;

/// Factory for instrumented channels.
#[derive(Clone)]
pub struct ZchainChannel {}

impl ZchainChannel {
    /// Creates a channel named `name`, bounded when `capacity` is given.
    ///
    /// The gauge `<name>_channel_actual_size` tracks the number of queued messages and
    /// the counter `<name>_channel_total_receive` the number of received ones.
    /// Fails only when `name` is not a valid prometheus metric name.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>(
        name: String,
        capacity: Option<usize>,
    ) -> Result<(ZchainSender<T>, ZchainReceiver<T>), prometheus::Error> {
        use prometheus::{Counter, Gauge};
        use tracing::debug;

        let (s, r) = if let Some(capacity) = capacity {
            crossbeam::channel::bounded::<T>(capacity)
        } else {
            crossbeam::channel::unbounded::<T>()
        };

        let actual_len = Gauge::new(
            format!("{}_channel_actual_size", name),
            "Actual length of channel",
        )?;

        let received = Counter::new(
            format!("{}_channel_total_receive", name),
            "Total received messages",
        )?;

        // several chains in one process (tests) register the same names
        if let Err(e) = prometheus::register(Box::new(actual_len.clone())) {
            debug!("Failed to register actual_len gauge for {} : {}", name, e);
        }

        if let Err(e) = prometheus::register(Box::new(received.clone())) {
            debug!("Failed to register received counter for {} : {}", name, e);
        }

        let sender = ZchainSender {
            sender: s,
            name: name.clone(),
            actual_len: actual_len.clone(),
        };

        let receiver = ZchainReceiver {
            receiver: r,
            name,
            actual_len,
            received,
            ref_counter: Arc::new(()),
        };

        Ok((sender, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    #[serial]
    fn test_bounded_channel_metrics() {
        let (tx, rx) = ZchainChannel::new::<u64>("test_bounded".to_string(), Some(2)).unwrap();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert!(tx.try_send(3).is_err());
        assert!(tx.send_timeout(3, Duration::from_millis(10)).is_err());
        assert_eq!(rx.recv().unwrap(), 1);
        rx.update_metrics();
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert!(rx.try_recv().is_err());
        assert_eq!(rx.name(), "test_bounded");
    }

    #[test]
    #[serial]
    fn test_invalid_name_rejected() {
        assert!(ZchainChannel::new::<u64>("not a metric".to_string(), None).is_err());
    }
}
