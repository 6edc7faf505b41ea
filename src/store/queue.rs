//! In-memory message queue with at-least-once delivery semantics.
//!
//! A received message stays on the queue but is hidden for the visibility
//! timeout; it is redelivered (with a fresh receipt handle) unless deleted
//! first. Receives long-poll with a bounded wait and never busy-sleep.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::Result;

/// Notification envelope wrapping every payload. The actual message is a
/// JSON document serialized into the `Message` field.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Message")]
    pub message: String,
}

/// One delivery of a queued message. The receipt handle identifies this
/// delivery only; it goes stale once the message is redelivered.
#[derive(Debug, Clone)]
pub struct Message {
    pub receipt_handle: String,
    pub body: String,
    pub receive_count: u32,
}

impl Message {
    /// Decode the inner payload out of the notification envelope.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let envelope: Envelope = serde_json::from_str(&self.body)?;
        Ok(serde_json::from_str(&envelope.message)?)
    }
}

#[derive(Debug)]
struct QueuedMessage {
    body: String,
    visible_at: Instant,
    receive_count: u32,
    /// Receipt handle of the outstanding delivery, if any
    receipt_handle: Option<String>,
}

/// An independent at-least-once queue.
#[derive(Debug)]
pub struct MessageQueue {
    name: String,
    visibility_timeout: Duration,
    inner: Mutex<VecDeque<QueuedMessage>>,
    notify: Notify,
}

impl MessageQueue {
    pub fn new(name: impl Into<String>, config: &QueueConfig) -> Self {
        Self {
            name: name.into(),
            visibility_timeout: config.visibility_timeout,
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish a payload wrapped in the notification envelope.
    pub fn send<T: Serialize>(&self, payload: &T) -> Result<()> {
        let envelope = Envelope {
            message: serde_json::to_string(payload)?,
        };
        self.send_raw(serde_json::to_string(&envelope)?);
        Ok(())
    }

    /// Publish a raw message body, bypassing payload serialization.
    pub fn send_raw(&self, body: String) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.push_back(QueuedMessage {
            body,
            visible_at: Instant::now(),
            receive_count: 0,
            receipt_handle: None,
        });
        drop(inner);
        self.notify.notify_one();
    }

    /// Long-poll receive: waits up to `wait` for visible messages and returns
    /// up to `max` of them. Returns an empty batch when the wait expires.
    pub async fn receive(&self, max: usize, wait: Duration) -> Vec<Message> {
        let deadline = Instant::now() + wait;
        loop {
            let (batch, next_visible) = self.take_visible(max);
            if !batch.is_empty() {
                return batch;
            }
            let now = Instant::now();
            if now >= deadline {
                return Vec::new();
            }
            // Wake on a new message, on the earliest redelivery, or at the
            // poll deadline, whichever comes first.
            let sleep_target = next_visible.map_or(deadline, |t| deadline.min(t));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(sleep_target) => {}
            }
        }
    }

    fn take_visible(&self, max: usize) -> (Vec<Message>, Option<Instant>) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut batch = Vec::new();
        let mut next_visible = None;
        for queued in inner.iter_mut() {
            if batch.len() >= max {
                break;
            }
            if queued.visible_at <= now {
                let receipt_handle = Uuid::new_v4().to_string();
                queued.visible_at = now + self.visibility_timeout;
                queued.receive_count += 1;
                queued.receipt_handle = Some(receipt_handle.clone());
                batch.push(Message {
                    receipt_handle,
                    body: queued.body.clone(),
                    receive_count: queued.receive_count,
                });
            } else {
                next_visible = match next_visible {
                    Some(t) if t <= queued.visible_at => Some(t),
                    _ => Some(queued.visible_at),
                };
            }
        }
        (batch, next_visible)
    }

    /// Acknowledge a delivery, removing the message permanently. Returns
    /// false when the receipt handle is stale (the message was redelivered
    /// or already deleted).
    pub fn delete(&self, receipt_handle: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.len();
        inner.retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));
        before != inner.len()
    }

    /// Number of messages on the queue, visible or in flight.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
