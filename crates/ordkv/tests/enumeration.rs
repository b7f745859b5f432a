//! Enumeration behavior, run against every backend.

use ordkv::{Accessor, MemKv, ScanRequest};
use ordkv_sled::test_utils::create_test_db;
use ordkv_store::RawKv;
use rand::Rng;
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::ControlFlow,
};

fn keys<S: RawKv>(accessor: &Accessor<S>, request: ScanRequest<'_>) -> Vec<String> {
    let mut out = Vec::new();
    accessor.enumerate_keys(request, |key| {
        out.push(key.to_owned());
        ControlFlow::Continue(())
    });
    out
}

fn seed_tes<S: RawKv>(accessor: &Accessor<S>) {
    accessor
        .add_entries(["tesa:0", "tess:0", "test:1", "test:2", "test:3", "test:4"].map(|k| (k, k)))
        .unwrap();
}

// ============================================================================
// Shared checks
// ============================================================================

fn backward_prefix_boundary<S: RawKv>(accessor: &Accessor<S>) {
    seed_tes(accessor);
    let request = ScanRequest::new().with_prefix("test").backward();
    assert_eq!(keys(accessor, request), ["test:4", "test:3", "test:2", "test:1"]);

    // A key equal to the prefix's upper bound must not leak into the run.
    accessor.set_value("tesu", "bound").unwrap();
    assert_eq!(keys(accessor, request), ["test:4", "test:3", "test:2", "test:1"]);
    accessor.set_value("tesu:9", "past").unwrap();
    assert_eq!(keys(accessor, request), ["test:4", "test:3", "test:2", "test:1"]);
}

fn start_outside_prefix_is_ignored<S: RawKv>(accessor: &Accessor<S>) {
    seed_tes(accessor);
    let with_start = ScanRequest::new().with_prefix("test").with_start("tesa:0");
    let expected = ["test:1", "test:2", "test:3", "test:4"];
    assert_eq!(keys(accessor, with_start), expected);
    assert_eq!(keys(accessor, ScanRequest::new().with_prefix("test")), expected);

    let backward = with_start.backward();
    assert_eq!(keys(accessor, backward), ["test:4", "test:3", "test:2", "test:1"]);
}

fn start_inside_prefix<S: RawKv>(accessor: &Accessor<S>) {
    seed_tes(accessor);
    let request = ScanRequest::new().with_prefix("test").with_start("test:2");
    assert_eq!(keys(accessor, request), ["test:2", "test:3", "test:4"]);
    assert_eq!(keys(accessor, request.backward()), ["test:2", "test:1"]);
}

fn random_numeric_keys<S: RawKv>(accessor: &Accessor<S>) {
    let mut rng = rand::rng();
    let mut set = BTreeSet::new();
    while set.len() < 2500 {
        set.insert(rng.random_range(0..10_000_000u32).to_string());
    }
    accessor.add_entries(set.iter().map(|k| (k.as_str(), true))).unwrap();

    let sorted: Vec<String> = set.iter().cloned().collect();
    assert_eq!(keys(accessor, ScanRequest::new()), sorted);

    let pivot = &sorted[rng.random_range(0..sorted.len())];
    let expected: Vec<String> = set.range(..=pivot.clone()).rev().cloned().collect();
    assert_eq!(keys(accessor, ScanRequest::new().with_start(pivot).backward()), expected);
}

fn predicates_filter_values<S: RawKv>(accessor: &Accessor<S>) {
    accessor.add_entries((0..100u32).map(|i| (format!("n:{i:03}"), i))).unwrap();
    accessor.set_value("text", "not a number").unwrap();

    let in_range = |v: &u32| (25..=50).contains(v);
    let matched = accessor.keys_where(in_range);
    assert_eq!(matched.len(), 26);
    assert_eq!(matched.first().map(String::as_str), Some("n:025"));
    assert_eq!(matched.last().map(String::as_str), Some("n:050"));

    let entries: BTreeMap<String, u32> = accessor.values_where(in_range);
    assert_eq!(entries.len(), 26);
    assert_eq!(entries.get("n:025"), Some(&25));
    assert_eq!(entries.get("n:050"), Some(&50));
    assert!(entries.iter().all(|(k, v)| *k == format!("n:{v:03}")));
    assert!(!entries.contains_key("text"));

    let mut backward = Vec::new();
    accessor.enumerate_keys_and_values_where(
        ScanRequest::new().with_prefix("n:").backward(),
        in_range,
        |_, v: u32| {
            backward.push(v);
            ControlFlow::Continue(())
        },
    );
    assert_eq!(backward, (25..=50).rev().collect::<Vec<_>>());
}

fn lazy_backward<S: RawKv>(accessor: &Accessor<S>) {
    accessor.add_entries((1..=5u32).map(|i| (format!("lazy:{i}"), i * 10))).unwrap();
    accessor.set_value("other", &0u32).unwrap();

    let mut seen = Vec::new();
    accessor.enumerate_keys_and_values_lazily::<u32, _>(
        ScanRequest::new().with_prefix("lazy:").backward(),
        |key, value| {
            if key.ends_with('3') {
                return ControlFlow::Break(());
            }
            seen.push(value.get());
            ControlFlow::Continue(())
        },
    );
    assert_eq!(seen, [Some(50), Some(40)]);

    let mut loaded = Vec::new();
    accessor.enumerate_keys_and_values_lazily_where::<u32, _, _>(
        ScanRequest::new().with_prefix("lazy:"),
        |v| *v > 30,
        |key, value| {
            loaded.push((key.to_owned(), value.is_loaded()));
            ControlFlow::Continue(())
        },
    );
    assert_eq!(loaded, [("lazy:4".to_owned(), true), ("lazy:5".to_owned(), true)]);
}

fn prefix_runs_are_contained_and_ordered<S: RawKv>(accessor: &Accessor<S>) {
    for key in ["b", "a:2", "a", "a:1", "a:10", "ab", "a;", "a:\u{e9}"] {
        accessor.set_value(key, &()).unwrap();
    }

    let forward = keys(accessor, ScanRequest::new().with_prefix("a:"));
    assert_eq!(forward, ["a:1", "a:10", "a:2", "a:\u{e9}"]);
    assert!(forward.windows(2).all(|w| w[0] < w[1]));

    let mut backward = keys(accessor, ScanRequest::new().with_prefix("a:").backward());
    backward.reverse();
    assert_eq!(backward, forward);

    assert!(keys(accessor, ScanRequest::new().with_prefix("c")).is_empty());
    assert!(keys(accessor, ScanRequest::new().with_prefix("c").backward()).is_empty());
    assert_eq!(keys(accessor, ScanRequest::new().with_prefix("b").backward()), ["b"]);
}

fn early_break<S: RawKv>(accessor: &Accessor<S>) {
    accessor.add_entries((0..10u32).map(|i| (format!("k{i}"), i))).unwrap();
    let mut count = 0;
    accessor.enumerate_keys_and_values::<u32, _>(ScanRequest::new(), |_, value| {
        count += 1;
        if value == 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    });
    assert_eq!(count, 4);
}

// ============================================================================
// Backends
// ============================================================================

macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod mem {
            use super::*;
            $(
                #[test]
                fn $name() {
                    super::$name(&Accessor::new(MemKv::new()));
                }
            )*
        }

        mod sled {
            use super::*;
            $(
                #[test]
                fn $name() {
                    let (_dir, db) = create_test_db();
                    super::$name(&Accessor::new(db));
                }
            )*
        }
    };
}

backend_tests!(
    backward_prefix_boundary,
    start_outside_prefix_is_ignored,
    start_inside_prefix,
    random_numeric_keys,
    predicates_filter_values,
    lazy_backward,
    prefix_runs_are_contained_and_ordered,
    early_break,
);
