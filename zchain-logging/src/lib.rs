// Copyright (c) 2021 The zchain developers
//! Structured trace events shared by every zchain crate.

/// Emits a `tracing` trace event named `$evt` with a JSON payload.
///
/// ```
/// # #[macro_use] extern crate zchain_logging;
/// let round = 12u64;
/// zchain_trace!("consensus.finalize_round", { "round": round });
/// ```
#[macro_export]
macro_rules! zchain_trace {
    ($evt:expr, $params:tt) => {
        tracing::trace!("zchain_trace:{}:{}", $evt, serde_json::json!($params));
    };
}
