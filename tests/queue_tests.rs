//! At-least-once delivery semantics of the message queue: long-poll bounds,
//! visibility timeouts, redelivery, and acknowledgment.

use std::time::Duration;

use annolite::config::QueueConfig;
use annolite::messages::JobRequest;
use annolite::store::MessageQueue;

fn fast_queue(visibility_ms: u64) -> MessageQueue {
    MessageQueue::new(
        "test-queue",
        &QueueConfig {
            wait_time: Duration::from_millis(50),
            visibility_timeout: Duration::from_millis(visibility_ms),
            max_messages: 10,
        },
    )
}

fn sample_request() -> JobRequest {
    JobRequest {
        job_id: "J1".to_string(),
        user_id: "U1".to_string(),
        input_file_name: "sample.vcf".to_string(),
        inputs_bucket: "annolite-inputs".to_string(),
        input_key: "U1/J1~sample.vcf".to_string(),
    }
}

#[tokio::test]
async fn send_receive_ack_round_trip() {
    let queue = fast_queue(500);
    queue.send(&sample_request()).unwrap();
    assert_eq!(queue.len(), 1);

    let batch = queue.receive(10, Duration::from_millis(100)).await;
    assert_eq!(batch.len(), 1);
    let request: JobRequest = batch[0].payload().unwrap();
    assert_eq!(request.job_id, "J1");
    assert_eq!(request.input_key, "U1/J1~sample.vcf");
    assert_eq!(batch[0].receive_count, 1);

    assert!(queue.delete(&batch[0].receipt_handle));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn long_poll_bounded_wait_returns_empty() {
    let queue = fast_queue(500);
    let start = tokio::time::Instant::now();
    let batch = queue.receive(10, Duration::from_millis(100)).await;
    assert!(batch.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn unacked_message_is_redelivered_after_visibility_timeout() {
    let queue = fast_queue(100);
    queue.send(&sample_request()).unwrap();

    let first = queue.receive(10, Duration::from_millis(100)).await;
    assert_eq!(first.len(), 1);

    // Hidden while in flight.
    let hidden = queue.receive(10, Duration::from_millis(30)).await;
    assert!(hidden.is_empty());

    // Visible again once the timeout lapses, with a fresh receipt handle.
    let second = queue.receive(10, Duration::from_millis(500)).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].receive_count, 2);
    assert_ne!(second[0].receipt_handle, first[0].receipt_handle);
}

#[tokio::test]
async fn ack_prevents_redelivery() {
    let queue = fast_queue(50);
    queue.send(&sample_request()).unwrap();

    let batch = queue.receive(10, Duration::from_millis(100)).await;
    assert!(queue.delete(&batch[0].receipt_handle));

    let after = queue.receive(10, Duration::from_millis(200)).await;
    assert!(after.is_empty());
}

#[tokio::test]
async fn stale_receipt_handle_cannot_delete() {
    let queue = fast_queue(50);
    queue.send(&sample_request()).unwrap();

    let first = queue.receive(10, Duration::from_millis(100)).await;
    let second = queue.receive(10, Duration::from_millis(500)).await;
    assert_eq!(second.len(), 1);

    // The first delivery's handle went stale at redelivery.
    assert!(!queue.delete(&first[0].receipt_handle));
    assert!(queue.delete(&second[0].receipt_handle));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn receive_caps_batch_size() {
    let queue = fast_queue(500);
    for _ in 0..5 {
        queue.send(&sample_request()).unwrap();
    }
    let batch = queue.receive(3, Duration::from_millis(100)).await;
    assert_eq!(batch.len(), 3);
    assert_eq!(queue.len(), 5);
}

#[tokio::test]
async fn malformed_body_fails_payload_decode() {
    let queue = fast_queue(500);
    queue.send_raw("not even json".to_string());

    let batch = queue.receive(10, Duration::from_millis(100)).await;
    assert_eq!(batch.len(), 1);
    assert!(batch[0].payload::<JobRequest>().is_err());
}

#[tokio::test]
async fn envelope_wraps_inner_json() {
    let queue = fast_queue(500);
    queue.send(&sample_request()).unwrap();

    let batch = queue.receive(10, Duration::from_millis(100)).await;
    let envelope: serde_json::Value = serde_json::from_str(&batch[0].body).unwrap();
    let inner = envelope["Message"].as_str().unwrap();
    let request: JobRequest = serde_json::from_str(inner).unwrap();
    assert_eq!(request.user_id, "U1");
}
