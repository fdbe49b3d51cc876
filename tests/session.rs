use merkle_courier::prelude::*;

fn dummy_files(count: usize) -> Vec<FileEntry> {
    (0..count)
        .map(|i| FileEntry::new(format!("{i}.txt"), format!("Hello {i}")))
        .collect()
}

#[test]
fn commit_ignores_discovery_order() {
    let files = dummy_files(9);
    let mut shuffled = files.clone();
    shuffled.reverse();
    shuffled.swap(1, 6);

    let mut session = Session::new();
    let root = session.commit(&files).unwrap();

    let mut other = Session::new();
    assert_eq!(other.commit(&shuffled).unwrap(), root);
    assert_eq!(session.root_hash(), Some(root));
}

#[test]
fn commit_needs_files() {
    let mut session = Session::new();

    assert_eq!(
        session.commit(&[]).unwrap_err(),
        SessionError::Tree(MerkleTreeError::EmptyInput)
    );
    assert!(session.tree().is_none());
}

#[test]
fn verify_before_commit_fails() {
    let session = Session::new();

    assert_eq!(
        session.verify_file(b"Hello 1", &MerkleProof::default()).unwrap_err(),
        SessionError::NoCommittedTree
    );
}

#[test]
fn downloaded_file_verifies_against_committed_root() {
    let files = dummy_files(21);
    let mut session = Session::new();
    let root = session.commit(&files).unwrap();

    let proof = session.proof_for(&files[13].data).unwrap();
    // NOTE: the proof goes over the wire and back like one fetched from the store
    let fetched = MerkleProof::from_json(&proof.to_json().unwrap()).unwrap();

    let verification = session.verify_file(&files[13].data, &fetched).unwrap();
    assert!(verification.is_valid);
    assert_eq!(verification.computed_root, root);
    assert_eq!(verification.stored_root, root);
}

#[test]
fn corrupted_file_is_detected() {
    let files = dummy_files(5);
    let mut session = Session::new();
    let root = session.commit(&files).unwrap();
    let proof = session.proof_for(&files[2].data).unwrap();

    let verification = session.verify_file(b"corrupted", &proof).unwrap();

    assert!(!verification.is_valid);
    assert_eq!(verification.stored_root, root);
    assert_ne!(verification.computed_root, root);
}

#[test]
fn unknown_content_has_no_proof() {
    let mut session = Session::new();
    session.commit(&dummy_files(3)).unwrap();

    assert!(matches!(
        session.proof_for(b"Hello 99"),
        Err(SessionError::Tree(MerkleTreeError::LeafNotFound(_)))
    ));
}

#[test]
fn recommit_replaces_the_tree() {
    let mut session = Session::new();
    let first = session.commit(&dummy_files(3)).unwrap();
    let second = session.commit(&dummy_files(4)).unwrap();

    assert_ne!(first, second);
    assert_eq!(session.root_hash(), Some(second));

    session.clear();
    assert_eq!(session.root_hash(), None);
}

#[test]
fn sorted_leaves_are_ascending() {
    let leaves = sorted_leaf_hashes(&dummy_files(16));

    assert!(leaves.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(leaves.len(), 16);
}
