// Copyright (c) 2022 The zchain developers

//! Node side of the chain engine callbacks
use nom::error::VerboseError;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zchain_consensus_exports::{
    error::ConsensusError, AfterFetcher, BlockStateHandler, FetchedNotarizedBlockHandler,
    ViewChanger,
};
use zchain_models::{
    Block, Deserializer, LfbRoundRecord, LfbRoundRecordDeserializer, LfbRoundRecordSerializer,
    Serializer,
};

/// Persists the latest finalized block record after every finalization
pub struct LfbRecordKeeper {
    path: PathBuf,
    magic_block_number: Mutex<u64>,
}

impl LfbRecordKeeper {
    pub fn new(path: PathBuf, magic_block_number: u64) -> Self {
        LfbRecordKeeper {
            path,
            magic_block_number: Mutex::new(magic_block_number),
        }
    }

    /// Record left by a previous run, if any
    pub fn load(path: &Path) -> Result<Option<LfbRoundRecord>, ConsensusError> {
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let (_, record) = LfbRoundRecordDeserializer::new()
            .deserialize::<VerboseError<&[u8]>>(&bytes)
            .map_err(|err| {
                ConsensusError::InvalidEntity(format!("LFB record {}: {}", path.display(), err))
            })?;
        Ok(Some(record))
    }

    fn store(&self, record: &LfbRoundRecord) -> Result<(), ConsensusError> {
        let mut buffer = Vec::new();
        LfbRoundRecordSerializer::new()
            .serialize(record, &mut buffer)
            .map_err(|err| ConsensusError::InvalidEntity(err.to_string()))?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &buffer)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl BlockStateHandler for LfbRecordKeeper {
    fn update_finalized_block(&self, block: &Block) -> Result<(), ConsensusError> {
        let magic_block_number = {
            let mut number = self.magic_block_number.lock();
            if let Some(mb) = &block.magic_block {
                *number = mb.magic_block_number;
            }
            *number
        };
        let record = LfbRoundRecord {
            round: block.round,
            hash: block.hash,
            magic_block_number,
        };
        self.store(&record)?;
        info!(
            "finalized block {} of round {} with {} transactions",
            block.hash,
            block.round,
            block.txns.len()
        );
        zchain_trace!("node.finalized_block", {
            "round": block.round,
            "hash": block.hash.to_string(),
            "magic_block_number": magic_block_number,
        });
        Ok(())
    }
}

/// Accepts every committee change. The engine already installed the magic
/// block, only the node logs are updated.
pub struct CommitteeLogger;

impl ViewChanger for CommitteeLogger {
    fn view_change(&self, lfb: &Block) -> Result<(), ConsensusError> {
        if let Some(mb) = &lfb.magic_block {
            info!(
                "committee {} starts at round {}: {} miners, {} sharders",
                mb.magic_block_number,
                mb.starting_round,
                mb.miners.size(),
                mb.sharders.size()
            );
        }
        Ok(())
    }
}

/// Logs the blocks obtained from other nodes
pub struct FetchLogger;

impl AfterFetcher for FetchLogger {
    fn after_fetch(&self, block: &Block, is_notarized: bool) -> Result<(), ConsensusError> {
        debug!(
            "fetched block {} of round {}, notarized: {}",
            block.hash, block.round, is_notarized
        );
        Ok(())
    }
}

impl FetchedNotarizedBlockHandler for FetchLogger {
    fn notarized_block_fetched(&self, block: &Block) {
        debug!(
            "fetched notarized block {} of round {}",
            block.hash, block.round
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zchain_hash::Hash;
    use zchain_models::{MagicBlock, NodeId};
    use zchain_time::ChainTime;

    fn block(round: u64) -> Block {
        Block::new(
            Hash::compute_from(&round.to_be_bytes()),
            round,
            NodeId::from_label("miner"),
            ChainTime::from_millis(round),
        )
        .seal()
    }

    #[test]
    fn test_lfb_record_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage/lfb_round_record");
        assert_eq!(LfbRecordKeeper::load(&path).unwrap(), None);

        let keeper = LfbRecordKeeper::new(path.clone(), 1);
        let first = block(1);
        keeper.update_finalized_block(&first).unwrap();
        assert_eq!(
            LfbRecordKeeper::load(&path).unwrap(),
            Some(LfbRoundRecord {
                round: 1,
                hash: first.hash,
                magic_block_number: 1,
            })
        );

        let mut second = block(2);
        second.magic_block = Some(MagicBlock::new(2, 6, Hash::ZERO));
        keeper.update_finalized_block(&second).unwrap();
        keeper.update_finalized_block(&block(3)).unwrap();
        let record = LfbRecordKeeper::load(&path).unwrap().unwrap();
        assert_eq!(record.round, 3);
        assert_eq!(record.magic_block_number, 2);
    }

    #[test]
    fn test_corrupted_lfb_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lfb_round_record");
        fs::write(&path, [1, 2, 3]).unwrap();
        assert!(LfbRecordKeeper::load(&path).is_err());
    }
}
