use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::{fmt::Display, str::FromStr};

/// Length in bytes of every hash stored in the tree
pub const HASH_LEN: usize = 32;

/// Opaque fixed-size digest of a leaf or of a node's children
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash([u8; HASH_LEN]);

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NodeHashError {
    #[error("expected 32 hash bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl NodeHash {
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        NodeHash(bytes)
    }

    pub fn inner(&self) -> [u8; HASH_LEN] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl Display for NodeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; HASH_LEN]> for NodeHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        NodeHash(bytes)
    }
}

impl From<&[u8; HASH_LEN]> for NodeHash {
    fn from(bytes: &[u8; HASH_LEN]) -> Self {
        NodeHash(*bytes)
    }
}

impl TryFrom<&[u8]> for NodeHash {
    type Error = NodeHashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let hash_bytes: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| NodeHashError::InvalidLength(bytes.len()))?;
        Ok(NodeHash(hash_bytes))
    }
}

impl FromStr for NodeHash {
    type Err = NodeHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        NodeHash::try_from(bytes.as_slice())
    }
}

/// A fixed-output hash function used for both leaves and parent nodes.
///
/// Trees, proofs and verification must all agree on the same hasher, otherwise
/// roots are not comparable.
pub trait NodeHasher {
    /// Hashes arbitrary bytes, e.g. a file's content, into a leaf hash
    fn digest(data: &[u8]) -> NodeHash;

    /// Hashes `left || right`. Operand order is significant.
    fn hash_pair(left: &NodeHash, right: &NodeHash) -> NodeHash;
}

/// SHA-256, the reference hasher for leaf and node hashes
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl NodeHasher for Sha256Hasher {
    fn digest(data: &[u8]) -> NodeHash {
        NodeHash(sha2::Sha256::digest(data).into())
    }

    fn hash_pair(left: &NodeHash, right: &NodeHash) -> NodeHash {
        let mut hasher = sha2::Sha256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        NodeHash(hasher.finalize().into())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha3Hasher;

impl NodeHasher for Sha3Hasher {
    fn digest(data: &[u8]) -> NodeHash {
        NodeHash(sha3::Sha3_256::digest(data).into())
    }

    fn hash_pair(left: &NodeHash, right: &NodeHash) -> NodeHash {
        let mut hasher = sha3::Sha3_256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        NodeHash(hasher.finalize().into())
    }
}

/// Hashes a file's content with the reference hasher
pub fn leaf_hash(data: &[u8]) -> NodeHash {
    Sha256Hasher::digest(data)
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Node {
    #[serde(with = "hash_serde")]
    pub hash: NodeHash,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_leaf() { "leaf" } else { "node" };
        write!(f, "{kind}: {}", self.hash_str())
    }
}

impl Node {
    pub fn leaf(hash: NodeHash) -> Self {
        Node {
            hash,
            left: None,
            right: None,
        }
    }

    /// Creates the parent of `left` and `right`, hashing them in that order
    pub fn parent<H: NodeHasher>(left: Node, right: Node) -> Self {
        let hash = H::hash_pair(&left.hash, &right.hash);

        Node {
            hash,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Serializes the node into a byte vector
    pub fn as_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn children(&self) -> Option<(&Node, &Node)> {
        match (self.left.as_deref(), self.right.as_deref()) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }
    }

    /// Returns a hex string representation of the node's hash
    pub fn hash_str(&self) -> String {
        self.hash.to_string()
    }
}

/// Serializes a [`NodeHash`] as a lowercase hex string
pub mod hash_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::node::NodeHash;

    pub fn serialize<S>(hash: &NodeHash, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hash.to_string())
    }

    pub fn deserialize<'de, D>(d: D) -> Result<NodeHash, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serializes a [`NodeHash`] as standard padded base64, the store's wire form
pub mod hash_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::node::NodeHash;

    pub fn serialize<S>(hash: &NodeHash, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(hash.as_bytes()))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<NodeHash, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        let bytes = STANDARD.decode(s).map_err(serde::de::Error::custom)?;
        NodeHash::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

/// Serializes raw bytes as standard padded base64
pub mod bytes_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
