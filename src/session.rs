use crate::{
    merkle_proof::MerkleProof,
    merkle_tree::{MerkleTree, MerkleTreeError},
    node::{leaf_hash, NodeHash},
    transport::FileEntry,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no Merkle tree has been committed yet")]
    NoCommittedTree,
    #[error(transparent)]
    Tree(#[from] MerkleTreeError),
}

/// Outcome of checking a downloaded file against the committed root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub is_valid: bool,
    pub computed_root: NodeHash,
    pub stored_root: NodeHash,
}

/// Holds the tree committed for the current file set.
///
/// Leaf hashes are always sorted before building, so the root depends only on
/// the set of file contents and not on the order the files were discovered in.
#[derive(Debug, Default)]
pub struct Session {
    tree: Option<MerkleTree>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `files`, builds the tree and makes it the committed one
    pub fn commit(&mut self, files: &[FileEntry]) -> Result<NodeHash, SessionError> {
        let leaves = sorted_leaf_hashes(files);
        let tree = MerkleTree::build(&leaves)?;
        let root = tree.root_hash();

        self.tree = Some(tree);
        Ok(root)
    }

    pub fn tree(&self) -> Option<&MerkleTree> {
        self.tree.as_ref()
    }

    pub fn root_hash(&self) -> Option<NodeHash> {
        self.tree.as_ref().map(MerkleTree::root_hash)
    }

    /// Drops the committed tree
    pub fn clear(&mut self) {
        self.tree = None;
    }

    /// Local inclusion proof for a file's content
    pub fn proof_for(&self, data: &[u8]) -> Result<MerkleProof, SessionError> {
        let tree = self.tree.as_ref().ok_or(SessionError::NoCommittedTree)?;
        Ok(tree.proof(&leaf_hash(data))?)
    }

    /// Checks downloaded `data` against the committed root using `proof`
    pub fn verify_file(&self, data: &[u8], proof: &MerkleProof) -> Result<Verification, SessionError> {
        let tree = self.tree.as_ref().ok_or(SessionError::NoCommittedTree)?;
        let check = tree.verify(&leaf_hash(data), proof);

        Ok(Verification {
            is_valid: check.is_valid,
            computed_root: check.computed_root,
            stored_root: tree.root_hash(),
        })
    }
}

/// SHA-256 of every file's content, in ascending byte order
pub fn sorted_leaf_hashes(files: &[FileEntry]) -> Vec<NodeHash> {
    let mut leaves: Vec<NodeHash> = files.iter().map(|file| leaf_hash(&file.data)).collect();
    leaves.sort();
    leaves
}
