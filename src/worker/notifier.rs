//! Notifier: sends a completion notification per results-ready message.
//! Delivery is best-effort; messages are acknowledged even when sending
//! fails so users never receive duplicate notifications indefinitely.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::messages::ResultsReady;
use crate::profiles::UserProfiles;
use crate::store::queue::Message;
use crate::store::MessageQueue;

/// Log-only mail delivery stub. A production deployment would swap in a real
/// transport behind the same call.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to, subject, body, "sending notification");
        Ok(())
    }
}

pub struct Notifier {
    queue: Arc<MessageQueue>,
    profiles: Arc<UserProfiles>,
    mailer: LogMailer,
    max_messages: usize,
    wait_time: Duration,
}

impl Notifier {
    pub fn new(
        queue: Arc<MessageQueue>,
        profiles: Arc<UserProfiles>,
        max_messages: usize,
        wait_time: Duration,
    ) -> Self {
        Self {
            queue,
            profiles,
            mailer: LogMailer,
            max_messages,
            wait_time,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("notifier started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("notifier shutting down");
                    break;
                }
                messages = self.queue.receive(self.max_messages, self.wait_time) => {
                    for message in messages {
                        self.handle_message(message);
                    }
                }
            }
        }
    }

    fn handle_message(&self, message: Message) {
        let ready: ResultsReady = match message.payload() {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!(error = %e, "malformed results-ready message, dropping");
                self.queue.delete(&message.receipt_handle);
                return;
            }
        };

        match self.profiles.get_profile(&ready.user_id) {
            Ok(profile) => {
                let subject = format!("Annotation job {} completed", ready.job_id);
                let body = format!(
                    "Hello {}, your annotation results are available at {}.",
                    profile.name, ready.result_key
                );
                if let Err(e) = self.mailer.send(&profile.email, &subject, &body) {
                    tracing::warn!(job_id = %ready.job_id, error = %e, "cannot send notification");
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %ready.job_id, error = %e, "cannot resolve contact address");
            }
        }

        // Best-effort: acknowledged regardless of delivery outcome.
        self.queue.delete(&message.receipt_handle);
    }
}
