// Copyright (c) 2022 The zchain developers
//! Agreement on the software version run by the committee.
//!
//! Every committee member reports the version it runs. A version is adopted
//! once at least `threshold_percent` of the members report it.
#![warn(missing_docs)]

mod config;
mod versioning;

pub use config::VersioningConfig;
pub use versioning::{VersioningError, VersionsConsensus, VersionsConsensusRaw};
