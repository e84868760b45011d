// Tests for serialized chunk delivery and first-error-wins behavior

mod common;

use common::{eventually, MockTransport};
use cross_recorder::audio::TrackKind;
use cross_recorder::recording::ChunkQueue;
use cross_recorder::RecorderError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn pcm(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

#[tokio::test]
async fn test_indices_are_per_track_and_start_at_zero() {
    let transport = MockTransport::new();
    let queue = ChunkQueue::new(transport.clone());

    queue.enqueue("s1", TrackKind::Mic, pcm(4));
    queue.enqueue("s1", TrackKind::Mic, pcm(4));
    queue.enqueue("s1", TrackKind::System, pcm(8));
    queue.flush().await;

    assert_eq!(transport.indices_for(TrackKind::Mic), vec![0, 1]);
    assert_eq!(transport.indices_for(TrackKind::System), vec![0]);

    let counts = queue.chunk_counts();
    assert_eq!(counts.get(&TrackKind::Mic), Some(&2));
    assert_eq!(counts.get(&TrackKind::System), Some(&1));
}

#[tokio::test]
async fn test_chunks_are_sent_in_enqueue_order() {
    let transport = MockTransport::new();
    *transport.chunk_delay.lock() = Some(Duration::from_millis(2));
    let queue = ChunkQueue::new(transport.clone());

    for i in 0..10u8 {
        queue.enqueue("s1", TrackKind::Mic, vec![i]);
    }
    queue.flush().await;

    let payloads: Vec<u8> = transport.chunks.lock().iter().map(|c| c.pcm[0]).collect();
    assert_eq!(payloads, (0..10).collect::<Vec<u8>>());
    assert_eq!(transport.indices_for(TrackKind::Mic), (0..10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_total_bytes_sums_reported_writes() {
    let transport = MockTransport::new();
    let queue = ChunkQueue::new(transport.clone());

    queue.enqueue("s1", TrackKind::Mic, pcm(100));
    queue.enqueue("s1", TrackKind::System, pcm(250));
    queue.flush().await;

    assert_eq!(queue.total_bytes(), 350);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_failure_stops_further_sends() {
    let transport = MockTransport::failing_chunk_at(1);
    *transport.chunk_delay.lock() = Some(Duration::from_millis(5));
    let queue = ChunkQueue::new(transport.clone());

    for _ in 0..5 {
        queue.enqueue("s1", TrackKind::Mic, pcm(10));
    }
    queue.flush().await;

    assert!(queue.is_errored());
    assert_eq!(transport.chunk_calls(), 2, "nothing is sent after the failure");
    assert_eq!(queue.total_bytes(), 10, "only the first chunk was stored");
    assert_eq!(queue.pending(), 0, "remaining entries are discarded");
}

#[tokio::test]
async fn test_error_callback_runs_once() {
    let transport = MockTransport::failing_chunk_at(0);
    let queue = ChunkQueue::new(transport.clone());

    let reasons = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reasons);
    queue.on_error(move |err| sink.lock().push(err.clone()));

    queue.enqueue("s1", TrackKind::Mic, pcm(10));
    queue.enqueue("s1", TrackKind::Mic, pcm(10));
    queue.flush().await;

    // Enqueues after the error are dropped and never report again
    queue.enqueue("s1", TrackKind::Mic, pcm(10));
    queue.flush().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(*reasons.lock(), vec![RecorderError::ChunkWriteFailed]);
    assert_eq!(transport.chunk_calls(), 1);
    assert_eq!(queue.total_bytes(), 0);
}

#[tokio::test]
async fn test_flush_on_empty_queue_returns() {
    let queue = ChunkQueue::new(MockTransport::new());

    tokio::time::timeout(Duration::from_secs(1), queue.flush())
        .await
        .expect("flush of an empty queue should resolve immediately");
}

#[tokio::test]
async fn test_reset_clears_error_and_counters() {
    let transport = MockTransport::failing_chunk_at(0);
    let queue = ChunkQueue::new(transport.clone());

    queue.enqueue("s1", TrackKind::Mic, pcm(10));
    queue.flush().await;
    assert!(queue.is_errored());

    queue.reset();
    assert!(!queue.is_errored());
    assert!(queue.chunk_counts().is_empty());

    queue.enqueue("s2", TrackKind::Mic, pcm(20));
    queue.flush().await;

    assert_eq!(queue.total_bytes(), 20);
    assert_eq!(transport.indices_for(TrackKind::Mic), vec![0]);
    assert_eq!(transport.chunks.lock()[0].session_id, "s2");
}

#[tokio::test]
async fn test_enqueue_does_not_wait_for_sends() {
    let transport = MockTransport::new();
    *transport.chunk_delay.lock() = Some(Duration::from_millis(50));
    let queue = ChunkQueue::new(transport.clone());

    let started = std::time::Instant::now();
    for _ in 0..5 {
        queue.enqueue("s1", TrackKind::Mic, pcm(2));
    }
    assert!(started.elapsed() < Duration::from_millis(50));

    assert!(eventually(|| transport.chunk_calls() >= 1).await);
    queue.flush().await;
    assert_eq!(transport.chunks.lock().len(), 5);
}

#[tokio::test]
async fn test_unsuccessful_response_poisons_the_queue() {
    let transport = MockTransport::unsuccessful_chunk_at(1);
    let queue = ChunkQueue::new(transport.clone());

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    queue.on_error(move |err| sink.lock().push(err.clone()));

    for _ in 0..4 {
        queue.enqueue("s1", TrackKind::Mic, pcm(10));
    }
    queue.flush().await;

    assert!(queue.is_errored());
    assert_eq!(transport.chunk_calls(), 2);
    assert_eq!(queue.total_bytes(), 10);

    queue.enqueue("s1", TrackKind::Mic, pcm(10));
    queue.flush().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(*errors.lock(), vec![RecorderError::ChunkWriteFailed]);
    assert_eq!(transport.chunk_calls(), 2, "later enqueues are dropped");
    assert_eq!(queue.total_bytes(), 10);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_reset_during_send_keeps_sends_serialized() {
    let transport = MockTransport::new();
    *transport.chunk_delay.lock() = Some(Duration::from_millis(50));
    let queue = ChunkQueue::new(transport.clone());

    queue.enqueue("old", TrackKind::Mic, pcm(10));
    assert!(eventually(|| transport.chunk_calls() == 1).await);

    queue.reset();
    queue.enqueue("new", TrackKind::Mic, pcm(20));
    queue.flush().await;

    assert_eq!(transport.max_in_flight(), 1);
    assert_eq!(transport.sessions_sent(), vec!["old", "new"]);
    assert_eq!(transport.indices_for(TrackKind::Mic), vec![0, 0]);
    assert_eq!(queue.total_bytes(), 20, "the send from before the reset is not counted");
    assert_eq!(queue.chunk_counts().get(&TrackKind::Mic), Some(&1));
}
