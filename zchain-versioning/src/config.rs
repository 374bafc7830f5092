// Copyright (c) 2022 The zchain developers

use zchain_models::Version;
use zchain_time::ChainTime;

/// Version announcement and adoption settings
#[derive(Debug, Clone)]
pub struct VersioningConfig {
    /// share of the committee, in percent, that must report a version for it to be adopted
    pub threshold_percent: u64,
    /// period between two announcements of our own version
    pub broadcast_period: ChainTime,
    /// version run by this node
    pub node_version: Version,
}
