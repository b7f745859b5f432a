use ordkv::{AccessorBuilder, AccessorError, ScanRequest, config::BackendKind};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    seq: u32,
    kind: String,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sled_task_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let instance =
        AccessorBuilder::new().backend(BackendKind::Sled).path(dir.path()).name("events").build().unwrap();
    let cancel = CancellationToken::new();
    let handle = instance.spawn(cancel.clone());

    for seq in 0..20u32 {
        let event = Event { seq, kind: if seq % 2 == 0 { "even" } else { "odd" }.to_owned() };
        handle.set_value(&format!("event:{seq:04}"), &event).await.unwrap();
    }
    handle.set_value("meta:count", &20u32).await.unwrap();

    let got = handle.value::<Event>("event:0007").await.unwrap();
    assert_eq!(got.map(|e| e.kind).as_deref(), Some("odd"));

    let recent = handle
        .keys(ScanRequest::new().with_prefix("event:").with_start("event:0003").backward())
        .await
        .unwrap();
    assert_eq!(recent, ["event:0003", "event:0002", "event:0001", "event:0000"]);

    handle.remove_all_values_with_prefix("event:").await.unwrap();
    assert_eq!(handle.all_keys().await.unwrap(), ["meta:count"]);

    cancel.cancel();
    // Once the task observes the token, requests are refused.
    while !handle.is_closed() {
        tokio::task::yield_now().await;
    }
    assert!(matches!(handle.value_exists("meta:count").await, Err(AccessorError::Cancelled)));
}

#[tokio::test]
async fn clones_share_one_queue() {
    let handle = AccessorBuilder::new()
        .backend(BackendKind::Memory)
        .build()
        .unwrap()
        .spawn(CancellationToken::new());

    let writers: Vec<_> = (0..4u32)
        .map(|w| {
            let handle = handle.clone();
            tokio::spawn(async move {
                for i in 0..25u32 {
                    handle.set_value(&format!("w{w}:{i:02}"), &i).await.unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    assert_eq!(handle.all_keys().await.unwrap().len(), 100);
    assert_eq!(handle.keys(ScanRequest::new().with_prefix("w2:")).await.unwrap().len(), 25);
    assert_eq!(handle.value::<u32>("w3:24").await.unwrap(), Some(24));
}

#[tokio::test]
async fn detached_write_precedes_next_read() {
    let instance = AccessorBuilder::new().backend(BackendKind::Memory).build().unwrap();
    let handle = instance.spawn(CancellationToken::new());
    handle.set_value_detached("k", &1u8).unwrap();
    assert_eq!(handle.value::<u8>("k").await.unwrap(), Some(1));
}
