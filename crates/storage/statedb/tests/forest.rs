//! Forest behavior: versioning, isolation, root embedding.

use std::sync::Arc;

use alloy_primitives::B256;
use urna_kv::MemoryStore;
use urna_statedb::{main_tree_config, RootLeafCodec, StateDb, StateDbError, TreeConfig};
use urna_tree::{Sha256Hasher, EMPTY_HASH};

fn fresh_db() -> StateDb {
    StateDb::new(Arc::new(MemoryStore::new()))
}

fn records_cfg() -> TreeConfig {
    TreeConfig::singleton("records", Arc::new(Sha256Hasher), 256, Arc::new(RootLeafCodec))
}

fn items_cfg() -> TreeConfig {
    TreeConfig::non_singleton("items", Arc::new(Sha256Hasher), 256, Arc::new(RootLeafCodec))
}

#[test]
fn fresh_forest_is_version_zero_with_zero_root() {
    let sdb = fresh_db();
    assert_eq!(sdb.version().unwrap(), 0);
    assert_eq!(sdb.hash().unwrap(), EMPTY_HASH);
}

#[test]
fn only_one_write_context_at_a_time() {
    let sdb = fresh_db();
    let tx = sdb.begin_tx().unwrap();
    assert!(matches!(sdb.begin_tx(), Err(StateDbError::TxAlreadyOpen)));
    drop(tx);
    // Dropping the context releases the guard.
    let _tx = sdb.begin_tx().unwrap();
}

#[test]
fn commit_advances_version_and_publishes_root() {
    let sdb = fresh_db();
    let mut tx = sdb.begin_tx().unwrap();
    tx.add(b"greeting", b"hello").unwrap();
    let working_root = tx.root();
    let (version, root) = tx.commit().unwrap();

    assert_eq!(version, 1);
    assert_eq!(root, working_root);
    assert_eq!(sdb.version().unwrap(), 1);
    assert_eq!(sdb.hash().unwrap(), root);

    let view = sdb.tree_view(None).unwrap();
    assert_eq!(view.get(b"greeting").unwrap(), b"hello");
}

#[test]
fn discard_drops_pending_changes() {
    let sdb = fresh_db();
    let mut tx = sdb.begin_tx().unwrap();
    tx.add(b"key", b"value").unwrap();
    tx.discard();

    assert_eq!(sdb.version().unwrap(), 0);
    assert_eq!(sdb.hash().unwrap(), EMPTY_HASH);
}

#[test]
fn uncommitted_writes_are_invisible_to_views() {
    let sdb = fresh_db();
    let mut tx = sdb.begin_tx().unwrap();
    tx.add(b"key", b"draft").unwrap();

    let view = sdb.tree_view(None).unwrap();
    assert!(view.get(b"key").is_err());
    assert_eq!(tx.get(b"key").unwrap(), b"draft");
}

#[test]
fn views_pin_their_version_across_commits() {
    let sdb = fresh_db();
    let mut tx = sdb.begin_tx().unwrap();
    tx.add(b"key", b"v1").unwrap();
    tx.commit().unwrap();

    let pinned = sdb.tree_view(None).unwrap();
    let root_v1 = pinned.root();

    for i in 0..10u8 {
        let mut tx = sdb.begin_tx().unwrap();
        tx.set(b"key", &[b'w', i]).unwrap();
        tx.commit().unwrap();
    }

    assert_eq!(pinned.version(), 1);
    assert_eq!(pinned.root(), root_v1);
    assert_eq!(pinned.get(b"key").unwrap(), b"v1");

    // A historical view resolves the same bytes.
    let historical = sdb.tree_view(Some(1)).unwrap();
    assert_eq!(historical.get(b"key").unwrap(), b"v1");
    assert_eq!(historical.root(), root_v1);

    // And the latest view sees the newest value.
    let latest = sdb.tree_view(None).unwrap();
    assert_eq!(latest.version(), 11);
    assert_eq!(latest.get(b"key").unwrap(), b"w\x09");
}

#[test]
fn unknown_version_is_rejected() {
    let sdb = fresh_db();
    assert!(matches!(sdb.tree_view(Some(3)), Err(StateDbError::VersionNotFound(3))));
}

#[test]
fn singleton_subtree_root_is_embedded_in_parent_leaf() {
    let sdb = fresh_db();
    let cfg = records_cfg();

    let mut tx = sdb.begin_tx().unwrap();
    tx.add(cfg.kind_id().as_bytes(), &[0u8; 32]).unwrap();
    {
        let mut records = tx.sub_tree(cfg.singleton_ref()).unwrap();
        records.add(&[0xAA; 20], b"first").unwrap();
        records.add(&[0xBB; 20], b"second").unwrap();
    }
    tx.commit().unwrap();

    let view = sdb.tree_view(None).unwrap();
    let records = view.sub_tree(cfg.singleton_ref()).unwrap();
    assert_eq!(records.get(&[0xAA; 20]).unwrap(), b"first");

    // The parent leaf carries exactly the sub-tree root.
    let parent_leaf = view.get(cfg.kind_id().as_bytes()).unwrap();
    assert_eq!(parent_leaf, records.root().to_vec());
    assert_ne!(records.root(), B256::ZERO);
}

#[test]
fn deep_add_propagates_through_every_level() {
    let sdb = fresh_db();
    let records = records_cfg();
    let items = items_cfg();
    let instance = vec![0x01; 32];

    let mut tx = sdb.begin_tx().unwrap();
    tx.add(records.kind_id().as_bytes(), &[0u8; 32]).unwrap();
    // Create the instance's parent leaf inside the records tree.
    tx.sub_tree(records.singleton_ref()).unwrap().add(&instance, &[0u8; 32]).unwrap();

    let path = vec![records.singleton_ref(), items.with_key(instance.clone())];
    let root_before = tx.root();
    tx.deep_add(&path, &[7u8; 8], b"payload").unwrap();
    assert_ne!(tx.root(), root_before);
    tx.commit().unwrap();

    let view = sdb.tree_view(None).unwrap();
    let leaf_view = view
        .deep_sub_tree(vec![records.singleton_ref(), items.with_key(instance.clone())])
        .unwrap();
    assert_eq!(leaf_view.get(&[7u8; 8]).unwrap(), b"payload");

    // Embedding invariant at both levels: records leaf == items root,
    // main leaf == records root.
    let records_view = view.sub_tree(records.singleton_ref()).unwrap();
    assert_eq!(records_view.get(&instance).unwrap(), leaf_view.root().to_vec());
    assert_eq!(view.get(records.kind_id().as_bytes()).unwrap(), records_view.root().to_vec());
}

#[test]
fn deep_sub_tree_of_missing_instance_errors() {
    let sdb = fresh_db();
    let records = records_cfg();
    let items = items_cfg();

    let mut tx = sdb.begin_tx().unwrap();
    tx.add(records.kind_id().as_bytes(), &[0u8; 32]).unwrap();
    tx.commit().unwrap();

    let view = sdb.tree_view(None).unwrap();
    let missing = view
        .deep_sub_tree(vec![records.singleton_ref(), items.with_key(vec![0x99; 32])]);
    assert!(matches!(missing, Err(StateDbError::SubTreeNotFound(_))));
}

#[test]
fn subtree_iteration_sees_pending_writes() {
    let sdb = fresh_db();
    let cfg = records_cfg();

    let mut tx = sdb.begin_tx().unwrap();
    tx.add(cfg.kind_id().as_bytes(), &[0u8; 32]).unwrap();
    let mut records = tx.sub_tree(cfg.singleton_ref()).unwrap();
    for i in 0u8..5 {
        records.add(&[i; 20], &[i]).unwrap();
    }

    let mut count = 0;
    records.iterate(&mut |_, _| {
        count += 1;
        false
    })
    .unwrap();
    assert_eq!(count, 5);
}

#[test]
fn no_state_entries_commit_with_the_tx_but_not_the_root() {
    let sdb = fresh_db();

    let mut tx = sdb.begin_tx().unwrap();
    tx.add(b"anchor", b"x").unwrap();
    let root_with_tree_write = tx.root();
    tx.no_state().put(b"aux/index", b"42").unwrap();
    assert_eq!(tx.root(), root_with_tree_write);
    assert_eq!(tx.no_state().get(b"aux/index").unwrap(), Some(b"42".to_vec()));
    tx.commit().unwrap();

    let view = sdb.tree_view(None).unwrap();
    assert_eq!(view.no_state().get(b"aux/index").unwrap(), Some(b"42".to_vec()));
}

#[test]
fn identical_operations_produce_identical_roots() {
    let build = || {
        let sdb = fresh_db();
        let cfg = records_cfg();
        let mut tx = sdb.begin_tx().unwrap();
        tx.add(cfg.kind_id().as_bytes(), &[0u8; 32]).unwrap();
        let mut records = tx.sub_tree(cfg.singleton_ref()).unwrap();
        for i in 0u8..20 {
            records.add(&[i; 20], &[i, i]).unwrap();
        }
        tx.commit().unwrap();
        sdb.hash().unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn main_tree_config_is_sha256_singleton() {
    let cfg = main_tree_config();
    assert_eq!(cfg.kind_id(), "main");
    assert!(cfg.is_singleton());
}
