// Copyright (c) 2022 The zchain developers

use zchain_models::ClientId;
use zchain_time::ChainTime;

/// State driver configuration
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// smart-contract execution timeout, zero runs without a timeout
    pub smart_contract_timeout: ChainTime,
    /// charge transaction fees
    pub fees_enabled: bool,
    /// receiver of the fees
    pub miners_sc_address: ClientId,
    /// smart contracts allowed to mint
    pub approved_minters: Vec<ClientId>,
    /// missing nodes fetched at once while pruning
    pub sync_batch_size: usize,
}
