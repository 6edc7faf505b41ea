//! Thaw initiator: starts cold-tier retrieval for archived results after a
//! tier upgrade. Retrieval completion is handled separately by the restore
//! trigger; this component never waits for it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::messages::{RetrievalDescription, ThawRequest};
use crate::store::queue::Message;
use crate::store::{ArchivalStatus, ArchiveVault, JobStore, MessageQueue, RetrievalTier};

pub struct ThawInitiator {
    queue: Arc<MessageQueue>,
    vault: Arc<ArchiveVault>,
    max_messages: usize,
    wait_time: Duration,
}

impl ThawInitiator {
    pub fn new(
        queue: Arc<MessageQueue>,
        vault: Arc<ArchiveVault>,
        max_messages: usize,
        wait_time: Duration,
    ) -> Self {
        Self {
            queue,
            vault,
            max_messages,
            wait_time,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("thaw initiator started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("thaw initiator shutting down");
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
        let request: ThawRequest = match message.payload() {
            Ok(request) => request,
            Err(e) => {
                // Poison-message policy: acknowledge and drop.
                tracing::warn!(error = %e, "malformed thaw request, dropping");
                self.queue.delete(&message.receipt_handle);
                return;
            }
        };

        match self.initiate(&request).await {
            Ok(retrieval_job_id) => {
                tracing::info!(
                    job_id = %request.job_id,
                    retrieval_job_id = %retrieval_job_id,
                    "retrieval initiated"
                );
                self.queue.delete(&message.receipt_handle);
            }
            Err(e) => {
                // Retryable: left unacknowledged for natural redelivery.
                tracing::error!(job_id = %request.job_id, error = %e, "cannot initiate retrieval");
            }
        }
    }

    /// Expedited retrieval with a single fallback to standard when the
    /// expedited pool is over-subscribed.
    async fn initiate(&self, request: &ThawRequest) -> Result<String> {
        let description = serde_json::to_string(&RetrievalDescription {
            job_id: request.job_id.clone(),
        })?;
        match self
            .vault
            .initiate_retrieval(&request.archive_id, RetrievalTier::Expedited, &description)
            .await
        {
            Ok(id) => Ok(id),
            Err(PipelineError::InsufficientCapacity) => {
                tracing::warn!(
                    job_id = %request.job_id,
                    "expedited retrieval over capacity, falling back to standard"
                );
                self.vault
                    .initiate_retrieval(&request.archive_id, RetrievalTier::Standard, &description)
                    .await
            }
            Err(e) => Err(e),
        }
    }
}

/// Tier-upgrade trigger: for every job of the user that is archived but not
/// yet thawing or restored, mark it THAWING and publish a thaw request.
/// Returns the number of requests published.
pub async fn request_thaw(
    user_id: &str,
    records: &JobStore,
    thaw_queue: &MessageQueue,
) -> Result<usize> {
    let mut requested = 0;
    for job in records.jobs_for_user(user_id) {
        if job.archival_status != Some(ArchivalStatus::Archived) {
            continue;
        }
        let (Some(archive_id), Some(result_key)) =
            (job.results_file_archive_id.clone(), job.result_key.clone())
        else {
            continue;
        };
        records.mark_thawing(&job.job_id)?;
        thaw_queue.send(&ThawRequest {
            job_id: job.job_id.clone(),
            user_id: user_id.to_string(),
            result_key,
            archive_id,
        })?;
        tracing::info!(job_id = %job.job_id, user_id, "thaw requested");
        requested += 1;
    }
    Ok(requested)
}
