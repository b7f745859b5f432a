use ordkv_sled::{DatabaseArguments, SledKv, test_utils::create_test_db};
use ordkv_store::{KvTraverse, RawKv, RawKvRead, RawKvWrite, StoreError, conformance};
use std::thread;

#[test]
fn sled_conformance() {
    let (_dir, db) = create_test_db();
    conformance::conformance(&db);
}

#[test]
fn temporary_conformance() {
    let db = SledKv::temporary().unwrap();
    conformance::conformance(&db);
}

#[test]
fn commits_survive_reopen() {
    let (dir, db) = create_test_db();
    let writer = db.writer().unwrap();
    writer.queue_raw_put(b"persist:1", b"one").unwrap();
    writer.queue_raw_put(b"persist:2", b"two").unwrap();
    writer.raw_commit().unwrap();
    db.flush().unwrap();
    drop(db);

    let db = DatabaseArguments::new().open(dir.path()).unwrap();
    let reader = db.reader().unwrap();
    assert_eq!(reader.raw_get(b"persist:2").unwrap().as_deref(), Some(b"two".as_slice()));
    assert_eq!(db.len(), 2);
}

#[test]
fn trees_are_isolated() {
    let (dir, db) = create_test_db();
    let writer = db.writer().unwrap();
    writer.queue_raw_put(b"shared", b"default").unwrap();
    writer.raw_commit().unwrap();
    drop(db);

    let other = DatabaseArguments::new().with_tree("other").open(dir.path()).unwrap();
    assert!(other.is_empty());
    let reader = other.reader().unwrap();
    assert!(reader.raw_get(b"shared").unwrap().is_none());
    assert!(reader.raw_traverse().unwrap().first().unwrap().is_none());
}

#[test]
fn clones_share_writer_lock() {
    let (_dir, db) = create_test_db();
    let clone = db.clone();

    let writer = db.writer().unwrap();
    let contended = thread::spawn(move || matches!(clone.writer(), Err(StoreError::WriteLocked)))
        .join()
        .unwrap();
    assert!(contended);

    // Readers are never blocked by a writer.
    assert!(db.reader().is_ok());
    writer.raw_commit().unwrap();
    assert!(db.writer().is_ok());
}
