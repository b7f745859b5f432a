//! Conformance tests for [`RawKv`] backends.
//!
//! Each function takes a store and panics on the first violated contract.
//! Every test starts by clearing the store, so the functions may be run in
//! any order against a single instance.

use crate::model::{KvTraverse, KvTraverseMut, RawKv, RawKvRead, RawKvWrite, StoreError};

/// Run all conformance tests against a [`RawKv`] implementation.
pub fn conformance<T: RawKv>(store: &T) {
    test_put_get_delete(store);
    test_uncommitted_writes_discarded(store);
    test_read_your_writes(store);
    test_single_writer(store);
    test_cursor_navigation(store);
    test_cursor_exact(store);
    test_cursor_mut_sees_queued_writes(store);
    test_delete_current_keeps_position(store);
    test_delete_prefix(store);
    test_delete_range(store);
    test_clear_prefix_empty_clears_all(store);
    test_byte_order(store);
}

fn reset<T: RawKv>(store: &T) {
    let writer = store.writer().unwrap();
    writer.queue_raw_clear().unwrap();
    writer.raw_commit().unwrap();
}

fn seed<T: RawKv>(store: &T, keys: &[&str]) {
    reset(store);
    let writer = store.writer().unwrap();
    for key in keys {
        writer.queue_raw_put(key.as_bytes(), format!("v-{key}").as_bytes()).unwrap();
    }
    writer.raw_commit().unwrap();
}

fn keys_forward<T: RawKv>(store: &T) -> Vec<String> {
    let reader = store.reader().unwrap();
    let mut cursor = reader.raw_traverse().unwrap();
    let mut out = Vec::new();
    let mut entry = cursor.first().unwrap().map(|(k, _)| k.into_owned());
    while let Some(key) = entry {
        out.push(String::from_utf8(key).unwrap());
        entry = cursor.read_next().unwrap().map(|(k, _)| k.into_owned());
    }
    out
}

/// Committed puts are readable, and committed deletes remove them.
pub fn test_put_get_delete<T: RawKv>(store: &T) {
    reset(store);

    let writer = store.writer().unwrap();
    writer.queue_raw_put(b"alpha", b"1").unwrap();
    writer.queue_raw_put(b"beta", b"2").unwrap();
    writer.raw_commit().unwrap();

    let reader = store.reader().unwrap();
    assert_eq!(reader.raw_get(b"alpha").unwrap().as_deref(), Some(b"1".as_slice()));
    assert!(reader.raw_contains(b"beta").unwrap());
    assert!(!reader.raw_contains(b"gamma").unwrap());
    drop(reader);

    let writer = store.writer().unwrap();
    writer.queue_raw_delete(b"alpha").unwrap();
    writer.queue_raw_put(b"beta", b"22").unwrap();
    writer.raw_commit().unwrap();

    let reader = store.reader().unwrap();
    assert!(reader.raw_get(b"alpha").unwrap().is_none());
    assert_eq!(reader.raw_get(b"beta").unwrap().as_deref(), Some(b"22".as_slice()));
}

/// Dropping a writer without committing leaves committed state untouched.
pub fn test_uncommitted_writes_discarded<T: RawKv>(store: &T) {
    seed(store, &["kept"]);

    {
        let writer = store.writer().unwrap();
        writer.queue_raw_put(b"lost", b"x").unwrap();
        writer.queue_raw_delete(b"kept").unwrap();
    }

    assert_eq!(keys_forward(store), vec!["kept"]);
}

/// Point reads through a writer observe its queued operations.
pub fn test_read_your_writes<T: RawKv>(store: &T) {
    seed(store, &["a", "b"]);

    let writer = store.writer().unwrap();
    writer.queue_raw_put(b"c", b"3").unwrap();
    writer.queue_raw_delete(b"a").unwrap();

    assert_eq!(writer.raw_get(b"c").unwrap().as_deref(), Some(b"3".as_slice()));
    assert!(writer.raw_get(b"a").unwrap().is_none());
    assert_eq!(writer.raw_get(b"b").unwrap().as_deref(), Some(b"v-b".as_slice()));

    writer.queue_raw_clear().unwrap();
    assert!(writer.raw_get(b"b").unwrap().is_none());
}

/// Only one write transaction may be open at a time.
pub fn test_single_writer<T: RawKv>(store: &T) {
    reset(store);

    let writer = store.writer().unwrap();
    assert!(matches!(store.writer(), Err(StoreError::WriteLocked)));
    drop(writer);

    let writer = store.writer().unwrap();
    writer.raw_commit().unwrap();
}

/// Cursor positioning and stepping follow byte-wise key order.
pub fn test_cursor_navigation<T: RawKv>(store: &T) {
    seed(store, &["b", "d", "f"]);

    let reader = store.reader().unwrap();
    let mut cursor = reader.raw_traverse().unwrap();

    let (k, v) = cursor.first().unwrap().unwrap();
    assert_eq!((k.as_ref(), v.as_ref()), (b"b".as_slice(), b"v-b".as_slice()));

    let (k, _) = cursor.read_next().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"d");

    let (k, _) = cursor.last().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"f");
    assert!(cursor.read_next().unwrap().is_none());

    let (k, _) = cursor.lower_bound(b"c").unwrap().unwrap();
    assert_eq!(k.as_ref(), b"d");
    let (k, _) = cursor.read_prev().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"b");
    assert!(cursor.read_prev().unwrap().is_none());

    let (k, _) = cursor.lower_bound(b"d").unwrap().unwrap();
    assert_eq!(k.as_ref(), b"d");
    assert!(cursor.lower_bound(b"g").unwrap().is_none());

    drop(cursor);
    drop(reader);
    reset(store);

    let reader = store.reader().unwrap();
    let mut cursor = reader.raw_traverse().unwrap();
    assert!(cursor.first().unwrap().is_none());
    assert!(cursor.last().unwrap().is_none());
    assert!(cursor.lower_bound(b"a").unwrap().is_none());
}

/// `exact` returns only exact matches, and positions the cursor on them.
pub fn test_cursor_exact<T: RawKv>(store: &T) {
    seed(store, &["k1", "k2", "k3"]);

    let reader = store.reader().unwrap();
    let mut cursor = reader.raw_traverse().unwrap();
    assert!(cursor.exact(b"k").unwrap().is_none());
    assert_eq!(cursor.exact(b"k2").unwrap().as_deref(), Some(b"v-k2".as_slice()));

    let (k, _) = cursor.read_next().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"k3");
}

/// Mutable cursors merge queued puts and deletes over committed entries.
pub fn test_cursor_mut_sees_queued_writes<T: RawKv>(store: &T) {
    seed(store, &["a", "c", "e"]);

    let writer = store.writer().unwrap();
    writer.queue_raw_put(b"b", b"queued").unwrap();
    writer.queue_raw_delete(b"c").unwrap();
    writer.queue_raw_put(b"e", b"replaced").unwrap();

    let mut cursor = writer.raw_traverse_mut().unwrap();
    let mut seen = Vec::new();
    let mut entry = cursor.first().unwrap().map(|(k, v)| (k.into_owned(), v.into_owned()));
    while let Some(kv) = entry {
        seen.push(kv);
        entry = cursor.read_next().unwrap().map(|(k, v)| (k.into_owned(), v.into_owned()));
    }
    assert_eq!(
        seen,
        vec![
            (b"a".to_vec(), b"v-a".to_vec()),
            (b"b".to_vec(), b"queued".to_vec()),
            (b"e".to_vec(), b"replaced".to_vec()),
        ]
    );

    let (k, _) = cursor.last().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"e");
    let (k, _) = cursor.read_prev().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"b");
    let (k, _) = cursor.lower_bound(b"c").unwrap().unwrap();
    assert_eq!(k.as_ref(), b"e");
}

/// Deleting the current entry leaves the cursor able to step past it.
pub fn test_delete_current_keeps_position<T: RawKv>(store: &T) {
    seed(store, &["a", "b", "c"]);

    let writer = store.writer().unwrap();
    let mut cursor = writer.raw_traverse_mut().unwrap();
    assert!(cursor.delete_current().is_err());

    let (k, _) = cursor.lower_bound(b"b").unwrap().unwrap();
    assert_eq!(k.as_ref(), b"b");
    cursor.delete_current().unwrap();
    let (k, _) = cursor.read_next().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"c");
    let (k, _) = cursor.read_prev().unwrap().unwrap();
    assert_eq!(k.as_ref(), b"a");
    drop(cursor);
    writer.raw_commit().unwrap();

    assert_eq!(keys_forward(store), vec!["a", "c"]);
}

/// Prefix deletion removes the contiguous run of matching keys and nothing
/// else.
pub fn test_delete_prefix<T: RawKv>(store: &T) {
    seed(store, &["dict", "dict:1", "dict:2", "dicz", "dib", "list:1"]);

    let writer = store.writer().unwrap();
    writer.clear_prefix(b"dict").unwrap();
    writer.raw_commit().unwrap();
    assert_eq!(keys_forward(store), vec!["dib", "dicz", "list:1"]);

    let writer = store.writer().unwrap();
    writer.clear_prefix(b"none").unwrap();
    writer.raw_commit().unwrap();
    assert_eq!(keys_forward(store), vec!["dib", "dicz", "list:1"]);
}

/// Range deletion honors its exclusive end.
pub fn test_delete_range<T: RawKv>(store: &T) {
    seed(store, &["a", "b", "c", "d"]);

    let writer = store.writer().unwrap();
    let mut cursor = writer.raw_traverse_mut().unwrap();
    cursor.delete_range(b"b".as_slice()..b"d".as_slice()).unwrap();
    drop(cursor);
    writer.raw_commit().unwrap();

    assert_eq!(keys_forward(store), vec!["a", "d"]);
}

/// An empty prefix means the whole store.
pub fn test_clear_prefix_empty_clears_all<T: RawKv>(store: &T) {
    seed(store, &["x", "y", "z"]);

    let writer = store.writer().unwrap();
    writer.clear_prefix(b"").unwrap();
    writer.raw_commit().unwrap();
    assert!(keys_forward(store).is_empty());

    seed(store, &["x", "y"]);
    let writer = store.writer().unwrap();
    let mut cursor = writer.raw_traverse_mut().unwrap();
    cursor.delete_prefix(b"").unwrap();
    drop(cursor);
    writer.raw_commit().unwrap();
    assert!(keys_forward(store).is_empty());
}

/// Keys order as unsigned bytes, including bytes above the ASCII range.
pub fn test_byte_order<T: RawKv>(store: &T) {
    reset(store);

    let keys: [&[u8]; 5] = [b"\x00", b"a", b"a\x00", b"a\x7f", b"a\xff"];
    let writer = store.writer().unwrap();
    for key in keys.iter().rev() {
        writer.queue_raw_put(key, b"").unwrap();
    }
    writer.raw_commit().unwrap();

    let reader = store.reader().unwrap();
    let mut cursor = reader.raw_traverse().unwrap();
    let mut seen = Vec::new();
    let mut entry = cursor.first().unwrap().map(|(k, _)| k.into_owned());
    while let Some(key) = entry {
        seen.push(key);
        entry = cursor.read_next().unwrap().map(|(k, _)| k.into_owned());
    }
    assert_eq!(seen, keys.iter().map(|k| k.to_vec()).collect::<Vec<_>>());
}
