//! Restore handler: copies retrieved bytes back to hot storage once a
//! cold-tier retrieval completes.
//!
//! `handle_restore` is a one-shot invocation with no internal retry; any
//! failure propagates to the trigger, which leaves the notification on the
//! queue for redelivery. Ordering inside the handler: the hot-storage write
//! is confirmed before the archive is deleted, and the RESTORED mark comes
//! last, so a crash mid-sequence leaves the job re-processable.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::messages::{RestoreNotification, RetrievalDescription};
use crate::store::queue::Message;
use crate::store::{ArchiveVault, JobStore, MessageQueue, ObjectStore};

/// Process one completed retrieval job. Idempotent under redelivery: the
/// hot-storage write simply overwrites the same bytes and an already-deleted
/// archive is tolerated.
pub async fn handle_restore(
    retrieval_job_id: &str,
    records: &JobStore,
    objects: &ObjectStore,
    vault: &ArchiveVault,
    results_bucket: &str,
) -> Result<()> {
    let retrieval = vault.retrieval_job(retrieval_job_id)?;
    let bytes = vault.get_retrieval_output(retrieval_job_id)?;
    let description: RetrievalDescription = serde_json::from_str(&retrieval.description)?;

    let record = records
        .get(&description.job_id)
        .ok_or_else(|| PipelineError::JobNotFound(description.job_id.clone()))?;
    let result_key = record
        .result_key
        .ok_or_else(|| PipelineError::Precondition {
            job_id: description.job_id.clone(),
            expected: "result key present".to_string(),
            actual: "absent".to_string(),
        })?;

    objects
        .put_object(results_bucket, &result_key, &bytes)
        .await?;

    match vault.delete_archive(&retrieval.archive_id).await {
        Ok(()) => {}
        Err(PipelineError::ArchiveNotFound(_)) => {
            tracing::debug!(
                archive_id = %retrieval.archive_id,
                "archive already deleted, continuing"
            );
        }
        Err(e) => return Err(e),
    }

    records.mark_restored(&description.job_id)?;

    tracing::info!(
        job_id = %description.job_id,
        retrieval_job_id,
        result_key = %result_key,
        "result restored to hot storage"
    );
    Ok(())
}

/// Invokes `handle_restore` once per restore notification. Acknowledges only
/// on success; failed invocations are redelivered (the trigger's retry
/// policy).
pub struct RestoreTrigger {
    queue: Arc<MessageQueue>,
    records: Arc<JobStore>,
    objects: Arc<ObjectStore>,
    vault: Arc<ArchiveVault>,
    results_bucket: String,
    max_messages: usize,
    wait_time: Duration,
}

impl RestoreTrigger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<MessageQueue>,
        records: Arc<JobStore>,
        objects: Arc<ObjectStore>,
        vault: Arc<ArchiveVault>,
        results_bucket: impl Into<String>,
        max_messages: usize,
        wait_time: Duration,
    ) -> Self {
        Self {
            queue,
            records,
            objects,
            vault,
            results_bucket: results_bucket.into(),
            max_messages,
            wait_time,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("restore trigger started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("restore trigger shutting down");
                    break;
                }
                messages = self.queue.receive(self.max_messages, self.wait_time) => {
                    for message in messages {
                        self.handle_message(message).await;
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: Message) {
        let notification: RestoreNotification = match message.payload() {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(error = %e, "malformed restore notification, dropping");
                self.queue.delete(&message.receipt_handle);
                return;
            }
        };

        match handle_restore(
            &notification.retrieval_job_id,
            &self.records,
            &self.objects,
            &self.vault,
            &self.results_bucket,
        )
        .await
        {
            Ok(()) => {
                self.queue.delete(&message.receipt_handle);
            }
            Err(e) => {
                tracing::error!(
                    retrieval_job_id = %notification.retrieval_job_id,
                    error = %e,
                    "restore failed, leaving notification for redelivery"
                );
            }
        }
    }
}
