// Copyright (c) 2022 The zchain developers

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;
use zchain_consensus_exports::error::ConsensusError;
use zchain_consensus_exports::MinerStats;
use zchain_hash::Hash;
use zchain_models::{Block, MagicBlock, NodeId};

use super::Chain;

impl Chain {
    /// Committee change run before `block` becomes the LFB. Any failure
    /// aborts the finalization.
    pub(crate) fn view_change(&self, block: &Block) -> Result<(), ConsensusError> {
        if let Some(mb) = &block.magic_block {
            mb.check().map_err(|err| {
                ConsensusError::ViewChangeFailed(format!("block {}: {}", block.hash, err))
            })?;
            self.magic_blocks
                .check_chain(mb, &self.self_id)
                .map_err(|err| ConsensusError::ViewChangeFailed(err.to_string()))?;
        }
        self.channels
            .view_changer
            .view_change(block)
            .map_err(|err| match err {
                ConsensusError::ViewChangeFailed(_) => err,
                other => ConsensusError::ViewChangeFailed(other.to_string()),
            })
    }

    /// Install a new magic block and refresh the known nodes
    pub fn update_magic_block(&self, mb: MagicBlock) -> Result<(), ConsensusError> {
        mb.check()
            .map_err(|err| ConsensusError::MagicBlockUpdate(err.to_string()))?;
        self.magic_blocks.put(mb.clone(), &self.self_id)?;
        self.update_nodes_from_magic_block(&mb);
        Ok(())
    }

    /// Keep the members of `mb` and of the magic block it replaced, resize
    /// the per-rank counters to the new generators count
    pub(crate) fn update_nodes_from_magic_block(&self, mb: &MagicBlock) {
        let mut keep: BTreeSet<NodeId> = mb.all_node_ids();
        if let Some(previous) = self.magic_blocks.previous() {
            keep.extend(previous.all_node_ids());
        }
        {
            let mut nodes = self.nodes.write();
            for node in mb.miners.nodes().chain(mb.sharders.nodes()) {
                nodes.insert(node.id, node.clone());
            }
            nodes.retain(|id, _| keep.contains(id));
        }
        let buckets = mb.num_generators(self.config.min_generators, self.config.generators_percent) + 1;
        {
            let mut counters = self.counters.write();
            for miner in mb.miners.keys() {
                counters
                    .miner_stats
                    .entry(*miner)
                    .or_insert_with(|| MinerStats::new(buckets))
                    .resize(buckets);
            }
            counters.notarization_buckets.resize(buckets, 0);
        }
        self.versions.update_nodes_list(mb.all_node_ids());
        info!("node monitor reset at round {}", mb.starting_round);
    }

    /// Latest finalized magic block announced by the sharders of `mb`, as the
    /// block carrying it
    pub fn get_lfmb_from_sharders(&self, mb: &MagicBlock) -> Option<Block> {
        let sharders: Vec<NodeId> = mb.sharders.keys().copied().collect();
        let replies = self
            .channels
            .network
            .get_lfmb_from_sharders(&sharders, self.config.timeout_large_message);
        let unique: BTreeMap<Hash, Block> = replies
            .into_iter()
            .filter(|block| block.magic_block.is_some())
            .map(|block| (block.hash, block))
            .collect();
        let mut blocks: Vec<Block> = unique.into_values().collect();
        blocks.sort_by_key(|block| {
            let starting_round = block
                .magic_block
                .as_ref()
                .map_or(0, |mb| mb.starting_round);
            (Reverse(starting_round), Reverse(block.round))
        });
        blocks.into_iter().next()
    }

    /// `None` when the caller already holds the latest finalized magic block
    pub fn get_latest_finalized_magic_block(
        &self,
        node_lfmb_hash: Option<Hash>,
    ) -> Option<MagicBlock> {
        let lfmb = self.magic_blocks.lfmb()?;
        if node_lfmb_hash == Some(lfmb.hash) {
            return None;
        }
        Some(lfmb.as_ref().clone())
    }
}
