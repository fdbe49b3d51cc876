use serde::{Deserialize, Serialize};

use crate::{
    merkle_tree::MerkleTreeError,
    node::{hash_base64, NodeHash},
};

/// One sibling encountered while walking from a leaf up to the root
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofStep {
    #[serde(rename = "hash", with = "hash_base64")]
    pub sibling_hash: NodeHash,
    /// When set the running hash is the right operand at this level
    #[serde(rename = "isLeftChild")]
    pub sibling_is_left_child: bool,
}

impl ProofStep {
    pub fn left(sibling_hash: NodeHash) -> Self {
        ProofStep {
            sibling_hash,
            sibling_is_left_child: true,
        }
    }

    pub fn right(sibling_hash: NodeHash) -> Self {
        ProofStep {
            sibling_hash,
            sibling_is_left_child: false,
        }
    }
}

/// Inclusion proof, ordered from the leaf's sibling up to the root's children
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MerkleProof {
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    pub fn new(steps: Vec<ProofStep>) -> Self {
        MerkleProof { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProofStep> {
        self.steps.iter()
    }

    /// Encodes the proof as a JSON array of `{"hash", "isLeftChild"}` objects,
    /// hashes in standard base64
    pub fn to_json(&self) -> Result<String, MerkleTreeError> {
        serde_json::to_string(self).map_err(|err| MerkleTreeError::ProofEncoding(err.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, MerkleTreeError> {
        serde_json::from_str(json).map_err(|err| MerkleTreeError::MalformedProof(err.to_string()))
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, MerkleTreeError> {
        serde_json::from_slice(bytes)
            .map_err(|err| MerkleTreeError::MalformedProof(err.to_string()))
    }

    /// Compact binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, MerkleTreeError> {
        bincode::serialize(self).map_err(|err| MerkleTreeError::ProofEncoding(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MerkleTreeError> {
        bincode::deserialize(bytes).map_err(|err| MerkleTreeError::MalformedProof(err.to_string()))
    }
}

impl From<Vec<ProofStep>> for MerkleProof {
    fn from(steps: Vec<ProofStep>) -> Self {
        MerkleProof { steps }
    }
}

impl<'a> IntoIterator for &'a MerkleProof {
    type Item = &'a ProofStep;
    type IntoIter = std::slice::Iter<'a, ProofStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Result of folding a proof back up to a root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofCheck {
    pub is_valid: bool,
    pub computed_root: NodeHash,
}
