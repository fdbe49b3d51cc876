use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt::Display, marker::PhantomData};

use crate::{
    merkle_proof::{MerkleProof, ProofCheck, ProofStep},
    node::*,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleTreeError {
    #[error("cannot build a tree without leaves")]
    EmptyInput,
    #[error("leaf {0} not found in tree")]
    LeafNotFound(NodeHash),
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error("failed to encode proof: {0}")]
    ProofEncoding(String),
}

/// Binary hash tree over an ordered leaf set.
///
/// Built once from its leaves and never mutated; a changed leaf set means a new
/// tree. Leaves keep the caller's order, nothing is sorted here.
#[derive(Debug, Clone, Serialize)]
pub struct MerkleTree<H = Sha256Hasher> {
    root: Node,
    depth: usize,
    leaf_count: usize,
    #[serde(skip)]
    hasher: PhantomData<H>,
}

impl MerkleTree<Sha256Hasher> {
    /// Builds a SHA-256 tree from `leaf_hashes`
    pub fn build(leaf_hashes: &[NodeHash]) -> Result<Self, MerkleTreeError> {
        Self::build_with(leaf_hashes)
    }
}

impl<H: NodeHasher> MerkleTree<H> {
    pub fn build_with(leaf_hashes: &[NodeHash]) -> Result<Self, MerkleTreeError> {
        if leaf_hashes.is_empty() {
            return Err(MerkleTreeError::EmptyInput);
        }

        let mut level: Vec<Node> = leaf_hashes.iter().copied().map(Node::leaf).collect();
        let mut depth = 0;

        while level.len() > 1 {
            // NOTE: an odd level pairs its last node with a copy of itself
            if level.len() % 2 != 0 {
                if let Some(last) = level.last().cloned() {
                    level.push(last);
                }
            }

            let mut next_level = Vec::with_capacity(level.len() / 2);
            let mut nodes = level.into_iter();
            while let (Some(left), Some(right)) = (nodes.next(), nodes.next()) {
                next_level.push(Node::parent::<H>(left, right));
            }

            level = next_level;
            depth += 1;
        }

        let root = level.pop().ok_or(MerkleTreeError::EmptyInput)?;

        Ok(MerkleTree {
            root,
            depth,
            leaf_count: leaf_hashes.len(),
            hasher: PhantomData,
        })
    }

    pub fn root_hash(&self) -> NodeHash {
        self.root.hash
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of edges between the root and any leaf
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaves the tree was built from, not counting padding copies
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Leaves left to right, including the copies added to pad odd levels
    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.iter().filter(|node| node.is_leaf())
    }

    pub fn proof(&self, leaf: &NodeHash) -> Result<MerkleProof, MerkleTreeError> {
        create_proof(&self.root, leaf)
    }

    /// Checks `leaf` against this tree's root using only `proof`
    pub fn verify(&self, leaf: &NodeHash, proof: &MerkleProof) -> ProofCheck {
        verify_proof_with::<H>(&self.root.hash, leaf, proof)
    }

    pub fn iter(&self) -> MerkleTreeIter {
        let mut queue = VecDeque::new();
        let mut node_refs = VecDeque::new();

        queue.push_back(&self.root);

        while let Some(node) = queue.pop_front() {
            if let Some(left) = node.left.as_ref() {
                queue.push_back(left);
            }

            if let Some(right) = node.right.as_ref() {
                queue.push_back(right);
            }

            node_refs.push_back(node);
        }

        MerkleTreeIter { node_refs }
    }
}

/// Builds the inclusion proof for `target` by a left-first depth-first search.
///
/// Steps are collected on the way back up, so the first step is the leaf's own
/// sibling.
pub fn create_proof(root: &Node, target: &NodeHash) -> Result<MerkleProof, MerkleTreeError> {
    fn find(node: &Node, target: &NodeHash, steps: &mut Vec<ProofStep>) -> bool {
        let Some((left, right)) = node.children() else {
            return node.is_leaf() && node.hash == *target;
        };

        if find(left, target, steps) {
            steps.push(ProofStep::right(right.hash));
            return true;
        }

        if find(right, target, steps) {
            steps.push(ProofStep::left(left.hash));
            return true;
        }

        false
    }

    let mut steps = vec![];

    if find(root, target, &mut steps) {
        Ok(MerkleProof::new(steps))
    } else {
        Err(MerkleTreeError::LeafNotFound(*target))
    }
}

/// Verifies `leaf` against `trusted_root` with the reference SHA-256 hasher
pub fn verify_proof(trusted_root: &NodeHash, leaf: &NodeHash, proof: &MerkleProof) -> ProofCheck {
    verify_proof_with::<Sha256Hasher>(trusted_root, leaf, proof)
}

pub fn verify_proof_with<H: NodeHasher>(
    trusted_root: &NodeHash,
    leaf: &NodeHash,
    proof: &MerkleProof,
) -> ProofCheck {
    let computed_root = proof.iter().fold(*leaf, |running, step| {
        if step.sibling_is_left_child {
            H::hash_pair(&step.sibling_hash, &running)
        } else {
            H::hash_pair(&running, &step.sibling_hash)
        }
    });

    ProofCheck {
        is_valid: computed_root == *trusted_root,
        computed_root,
    }
}

impl<H> Display for MerkleTree<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let serialized = serde_json::to_string_pretty(&self.root).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", serialized)
    }
}

#[derive(Debug, Clone)]
pub struct MerkleTreeIter<'a> {
    node_refs: VecDeque<&'a Node>,
}

impl<'a> Iterator for MerkleTreeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let next_node = self.node_refs.pop_front()?;

        Some(next_node)
    }
}
