// Copyright (c) 2022 The zchain developers

use serde::{Deserialize, Serialize};
use zchain_hash::Hash;
use zchain_signature::{KeyPair, PublicKey, Signature};

use crate::{ClientId, ModelsError, NodeId};

/// A miner's signature over a block hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTicket {
    /// signing miner
    pub verifier_id: NodeId,
    /// signature over the block hash
    pub signature: Signature,
}

impl VerificationTicket {
    /// Sign `block_hash` with `keypair`
    pub fn new(block_hash: &Hash, keypair: &KeyPair) -> Self {
        VerificationTicket {
            verifier_id: ClientId::from_public_key(&keypair.get_public_key()),
            signature: keypair.sign(block_hash),
        }
    }
}

/// Announcement by a sharder of its latest finalized block.
///
/// A ticket without signature is a local kick: it updates the engine's latest
/// ticket without being broadcast nor checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfbTicket {
    /// round of the announced block
    pub round: u64,
    /// announcing sharder
    pub sharder_id: NodeId,
    /// hash of the announced block
    pub lfb_hash: Hash,
    /// sharder signature over [`LfbTicket::hash_data`]
    pub signature: Option<Signature>,
    /// nodes this ticket was received from
    #[serde(skip)]
    pub senders: Vec<NodeId>,
    /// minted by this node
    #[serde(skip)]
    pub is_own: bool,
}

impl LfbTicket {
    /// Ticket signed by `keypair`
    pub fn new_signed(round: u64, lfb_hash: Hash, keypair: &KeyPair) -> Self {
        let sharder_id = ClientId::from_public_key(&keypair.get_public_key());
        let mut ticket = LfbTicket {
            round,
            sharder_id,
            lfb_hash,
            signature: None,
            senders: Vec::new(),
            is_own: true,
        };
        ticket.signature = Some(keypair.sign(&ticket.hash_data()));
        ticket
    }

    /// Unsigned local ticket
    pub fn unsigned(round: u64, lfb_hash: Hash) -> Self {
        LfbTicket {
            round,
            sharder_id: NodeId::default(),
            lfb_hash,
            signature: None,
            senders: Vec::new(),
            is_own: true,
        }
    }

    /// Hash of `round:sharder_id:lfb_hash`, the signed payload
    pub fn hash_data(&self) -> Hash {
        Hash::compute_from(format!("{}:{}:{}", self.round, self.sharder_id, self.lfb_hash).as_bytes())
    }

    /// `sharder_id:round`
    pub fn key(&self) -> String {
        format!("{}:{}", self.sharder_id, self.round)
    }

    /// Does the ticket carry a signature
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Check the signature against the sharder key
    pub fn verify(&self, sharder_key: &PublicKey) -> Result<(), ModelsError> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| ModelsError::InvalidEntity(format!("unsigned ticket {}", self.key())))?;
        if ClientId::from_public_key(sharder_key) != self.sharder_id {
            return Err(ModelsError::InvalidEntity(format!(
                "ticket {} checked with a foreign key",
                self.key()
            )));
        }
        sharder_key.verify_signature(&self.hash_data(), signature)?;
        Ok(())
    }

    /// Record another sender, returns false if already known
    pub fn add_sender(&mut self, sender: NodeId) -> bool {
        if self.senders.contains(&sender) {
            return false;
        }
        self.senders.push(sender);
        true
    }
}
