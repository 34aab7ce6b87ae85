//! Tests for the log tailer against plain files: chunking, follow
//! semantics, back-pressure and cancellation, independent of any child
//! process.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use jobd::error::JobError;
use jobd::logs::{LogStore, LogTailer};

struct Fixture {
    store: LogStore,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("create temp dir");
    Fixture {
        store: LogStore::new(dir.path()),
        _dir: dir,
    }
}

async fn collect(mut rx: mpsc::Receiver<Vec<u8>>) -> Vec<u8> {
    let mut bytes = Vec::new();
    while let Some(chunk) = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for chunk")
    {
        bytes.extend_from_slice(&chunk);
    }
    bytes
}

#[tokio::test]
async fn test_tail_missing_log() {
    let fx = fixture();
    let tailer = LogTailer::new(fx.store.clone(), 1024);

    let result = tailer
        .tail(CancellationToken::new(), Uuid::new_v4(), || true)
        .await;
    assert!(matches!(result, Err(JobError::NotFound(_))));
}

#[tokio::test]
async fn test_chunk_size_is_respected() {
    let fx = fixture();
    let id = Uuid::new_v4();
    let mut file = fx.store.create(&id).expect("create log");
    file.write_all(b"abcdefghijklmnopqrst").expect("write"); // 20 bytes
    drop(file);

    let tailer = LogTailer::new(fx.store.clone(), 8);
    let mut rx = tailer
        .tail(CancellationToken::new(), id, || true)
        .await
        .expect("tail");

    let mut bytes = Vec::new();
    while let Some(chunk) = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
    {
        assert!(chunk.len() <= 8, "chunk exceeds configured size");
        assert!(!chunk.is_empty(), "empty chunks are never published");
        bytes.extend_from_slice(&chunk);
    }
    assert_eq!(bytes, b"abcdefghijklmnopqrst");
}

#[tokio::test]
async fn test_follows_appends_until_writer_done() {
    let fx = fixture();
    let id = Uuid::new_v4();
    let mut file = fx.store.create(&id).expect("create log");

    let done = Arc::new(AtomicBool::new(false));
    let probe = Arc::clone(&done);
    let tailer = LogTailer::new(fx.store.clone(), 1024);
    let mut rx = tailer
        .tail(CancellationToken::new(), id, move || {
            probe.load(Ordering::Acquire)
        })
        .await
        .expect("tail");

    file.write_all(b"abc").expect("append");
    file.flush().expect("flush");
    let chunk = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for appended bytes")
        .expect("stream closed early");
    assert_eq!(chunk, b"abc");

    // Bytes written before the writer-done flip must still be delivered,
    // then the stream ends on its own.
    file.write_all(b"def").expect("append");
    file.flush().expect("flush");
    done.store(true, Ordering::Release);
    drop(file);

    assert_eq!(collect(rx).await, b"def");
}

#[tokio::test]
async fn test_replay_starts_at_offset_zero() {
    let fx = fixture();
    let id = Uuid::new_v4();
    let mut file = fx.store.create(&id).expect("create log");
    file.write_all(b"written before any subscriber").expect("write");
    drop(file);

    let tailer = LogTailer::new(fx.store.clone(), 1024);
    let rx = tailer
        .tail(CancellationToken::new(), id, || true)
        .await
        .expect("tail");
    assert_eq!(collect(rx).await, b"written before any subscriber");
}

#[tokio::test]
async fn test_cancellation_closes_stream() {
    let fx = fixture();
    let id = Uuid::new_v4();
    fx.store.create(&id).expect("create log");

    let token = CancellationToken::new();
    let tailer = LogTailer::new(fx.store.clone(), 1024);
    let mut rx = tailer
        .tail(token.clone(), id, || false)
        .await
        .expect("tail");

    token.cancel();

    let closed = timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "stream should close after cancellation");
}

#[tokio::test]
async fn test_slow_consumer_loses_no_bytes() {
    let fx = fixture();
    let id = Uuid::new_v4();
    let mut file = fx.store.create(&id).expect("create log");
    let payload: Vec<u8> = (0..10_240).map(|i| (i % 251) as u8).collect();
    file.write_all(&payload).expect("write payload");
    drop(file);

    let tailer = LogTailer::new(fx.store.clone(), 1024);
    let mut rx = tailer
        .tail(CancellationToken::new(), id, || true)
        .await
        .expect("tail");

    // Publication blocks on the consumer; draining slowly must still
    // surface every byte in order.
    let mut bytes = Vec::new();
    while let Some(chunk) = timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out")
    {
        bytes.extend_from_slice(&chunk);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(bytes, payload);
}
