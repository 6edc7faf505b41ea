//! Archival sweeper: demotes completed results of free-tier users from hot
//! storage to the cold archival tier.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::messages::ArchiveRequest;
use crate::profiles::{UserProfiles, UserTier};
use crate::store::queue::Message;
use crate::store::{ArchiveVault, JobStore, MessageQueue, ObjectStore};

pub struct ArchivalSweeper {
    queue: Arc<MessageQueue>,
    objects: Arc<ObjectStore>,
    vault: Arc<ArchiveVault>,
    records: Arc<JobStore>,
    profiles: Arc<UserProfiles>,
    results_bucket: String,
    max_messages: usize,
    wait_time: Duration,
}

impl ArchivalSweeper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<MessageQueue>,
        objects: Arc<ObjectStore>,
        vault: Arc<ArchiveVault>,
        records: Arc<JobStore>,
        profiles: Arc<UserProfiles>,
        results_bucket: impl Into<String>,
        max_messages: usize,
        wait_time: Duration,
    ) -> Self {
        Self {
            queue,
            objects,
            vault,
            records,
            profiles,
            results_bucket: results_bucket.into(),
            max_messages,
            wait_time,
        }
    }

    /// Synchronous per-message processing; throughput is low and the
    /// resource ordering below matters more than parallelism.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("archival sweeper started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("archival sweeper shutting down");
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
        let request: ArchiveRequest = match message.payload() {
            Ok(request) => request,
            Err(e) => {
                // Poison-message policy: acknowledge and drop.
                tracing::warn!(error = %e, "malformed archive request, dropping");
                self.queue.delete(&message.receipt_handle);
                return;
            }
        };

        let profile = match self.profiles.get_profile(&request.user_id) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(job_id = %request.job_id, error = %e, "cannot look up user, dropping");
                self.queue.delete(&message.receipt_handle);
                return;
            }
        };

        match profile.tier {
            UserTier::PremiumUser => {
                tracing::debug!(job_id = %request.job_id, "premium user, results stay in hot storage");
                self.queue.delete(&message.receipt_handle);
            }
            UserTier::FreeUser => {
                if self.archive_result(&request).await {
                    self.queue.delete(&message.receipt_handle);
                }
            }
        }
    }

    /// Move one result blob to cold storage. Ordering: cold upload, then
    /// record the handle, then delete the hot copy. The hot copy survives
    /// any failure before its archive handle is durably recorded; a crash
    /// in between leaves at worst an orphaned cold blob, never lost data.
    async fn archive_result(&self, request: &ArchiveRequest) -> bool {
        let bytes = match self
            .objects
            .get_object(&self.results_bucket, &request.result_key)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    job_id = %request.job_id,
                    result_key = %request.result_key,
                    error = %e,
                    "cannot read result from hot storage, dropping"
                );
                return true;
            }
        };

        let archive_id = match self.vault.upload_archive(&bytes).await {
            Ok(archive_id) => archive_id,
            Err(e) => {
                tracing::error!(job_id = %request.job_id, error = %e, "cold upload failed");
                return false;
            }
        };

        if let Err(e) = self.records.record_archive(&request.job_id, &archive_id) {
            tracing::error!(job_id = %request.job_id, error = %e, "cannot record archive handle");
            return false;
        }

        if let Err(e) = self
            .objects
            .delete_object(&self.results_bucket, &request.result_key)
            .await
        {
            // Handle is recorded; redelivery will re-archive and finish the
            // delete. The stale cold copy from this attempt is orphaned.
            tracing::error!(job_id = %request.job_id, error = %e, "cannot delete hot copy");
            return false;
        }

        tracing::info!(
            job_id = %request.job_id,
            user_id = %request.user_id,
            archive_id = %archive_id,
            "result archived to cold storage"
        );
        true
    }
}
