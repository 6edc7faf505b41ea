//! Wires the leaf services together and spawns the worker loops.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::profiles::{UserProfiles, UserTier};
use crate::store::{ArchiveVault, JobStore, MessageQueue, ObjectStore};
use crate::submit::{self, Submission};
use crate::worker::annotator::AnnotationWorker;
use crate::worker::{
    thaw, ArchivalSweeper, Dispatcher, Notifier, RestoreTrigger, ThawInitiator,
};

/// Shared handles for the whole pipeline: configuration, the record store,
/// both storage tiers, the user-profile collaborator, and the five queues.
pub struct Pipeline {
    pub config: ServiceConfig,
    pub records: Arc<JobStore>,
    pub objects: Arc<ObjectStore>,
    pub vault: Arc<ArchiveVault>,
    pub profiles: Arc<UserProfiles>,
    pub job_requests: Arc<MessageQueue>,
    pub archive_requests: Arc<MessageQueue>,
    pub thaw_requests: Arc<MessageQueue>,
    pub restore_notifications: Arc<MessageQueue>,
    pub results_ready: Arc<MessageQueue>,
}

impl Pipeline {
    pub fn new(config: ServiceConfig) -> Self {
        let job_requests = Arc::new(MessageQueue::new("job-requests", &config.queue));
        let archive_requests = Arc::new(MessageQueue::new("archive-requests", &config.queue));
        let thaw_requests = Arc::new(MessageQueue::new("thaw-requests", &config.queue));
        let restore_notifications =
            Arc::new(MessageQueue::new("restore-notifications", &config.queue));
        let results_ready = Arc::new(MessageQueue::new("results-ready", &config.queue));

        let vault = Arc::new(ArchiveVault::new(
            config.storage.vault_dir.clone(),
            config.retrieval.clone(),
            Arc::clone(&restore_notifications),
        ));

        Self {
            records: Arc::new(JobStore::new()),
            objects: Arc::new(ObjectStore::new(config.storage.data_dir.clone())),
            vault,
            profiles: Arc::new(UserProfiles::new()),
            job_requests,
            archive_requests,
            thaw_requests,
            restore_notifications,
            results_ready,
            config,
        }
    }

    /// Spawn every worker loop. Each loop drains until the token cancels;
    /// instances may be spawned more than once for horizontal scaling since
    /// all coordination goes through conditional record-store updates.
    pub fn spawn_workers(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let queue_cfg = &self.config.queue;
        let max = queue_cfg.max_messages;
        let wait = queue_cfg.wait_time;
        let results_bucket = self.config.storage.results_bucket.clone();

        let worker = Arc::new(AnnotationWorker::new(
            self.config.engine.clone(),
            Arc::clone(&self.objects),
            Arc::clone(&self.records),
            Arc::clone(&self.results_ready),
            Arc::clone(&self.archive_requests),
            results_bucket.clone(),
        ));

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.job_requests),
            Arc::clone(&self.objects),
            Arc::clone(&self.records),
            worker,
            self.config.storage.jobs_dir.clone(),
            max,
            wait,
        );

        let sweeper = ArchivalSweeper::new(
            Arc::clone(&self.archive_requests),
            Arc::clone(&self.objects),
            Arc::clone(&self.vault),
            Arc::clone(&self.records),
            Arc::clone(&self.profiles),
            results_bucket.clone(),
            max,
            wait,
        );

        let thaw_initiator = ThawInitiator::new(
            Arc::clone(&self.thaw_requests),
            Arc::clone(&self.vault),
            max,
            wait,
        );

        let restore_trigger = RestoreTrigger::new(
            Arc::clone(&self.restore_notifications),
            Arc::clone(&self.records),
            Arc::clone(&self.objects),
            Arc::clone(&self.vault),
            results_bucket,
            max,
            wait,
        );

        let notifier = Notifier::new(
            Arc::clone(&self.results_ready),
            Arc::clone(&self.profiles),
            max,
            wait,
        );

        vec![
            tokio::spawn(dispatcher.run(cancel.clone())),
            tokio::spawn(sweeper.run(cancel.clone())),
            tokio::spawn(thaw_initiator.run(cancel.clone())),
            tokio::spawn(restore_trigger.run(cancel.clone())),
            tokio::spawn(notifier.run(cancel.clone())),
        ]
    }

    /// Submit a new annotation job on behalf of a user.
    pub async fn submit(&self, input: &Path, user_id: &str) -> Result<Submission> {
        submit::submit_job(
            input,
            user_id,
            &self.config.storage.inputs_bucket,
            &self.objects,
            &self.records,
            &self.job_requests,
        )
        .await
    }

    /// Tier-upgrade flow: promote the user to premium and request a thaw of
    /// every archived result. Returns the number of thaw requests published.
    pub async fn upgrade_user(&self, user_id: &str) -> Result<usize> {
        self.profiles.set_tier(user_id, UserTier::PremiumUser)?;
        thaw::request_thaw(user_id, &self.records, &self.thaw_requests).await
    }
}
