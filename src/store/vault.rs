//! Cold-tier archival storage with asynchronous retrieval.
//!
//! An uploaded archive is addressable only by its opaque handle. Reading it
//! back requires initiating a retrieval job, which completes after a per-tier
//! delay; completion is announced by publishing the retrieval job id to the
//! restore-notification queue. Expedited retrievals draw from a bounded slot
//! pool and fail with `InsufficientCapacity` when it is exhausted.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::{PipelineError, Result};
use crate::messages::RestoreNotification;
use crate::store::queue::MessageQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalTier {
    Expedited,
    Standard,
}

impl std::fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalTier::Expedited => write!(f, "Expedited"),
            RetrievalTier::Standard => write!(f, "Standard"),
        }
    }
}

/// One asynchronous retrieval operation against the vault.
#[derive(Debug, Clone)]
pub struct RetrievalJob {
    pub id: String,
    pub archive_id: String,
    pub tier: RetrievalTier,
    /// Opaque correlation payload supplied at initiation
    pub description: String,
    output: Option<Vec<u8>>,
}

impl RetrievalJob {
    pub fn is_ready(&self) -> bool {
        self.output.is_some()
    }
}

#[derive(Debug)]
pub struct ArchiveVault {
    root: PathBuf,
    config: RetrievalConfig,
    notify_queue: Arc<MessageQueue>,
    jobs: Mutex<HashMap<String, RetrievalJob>>,
}

impl ArchiveVault {
    /// `notify_queue` receives a `RestoreNotification` whenever a retrieval
    /// job completes.
    pub fn new(
        root: impl Into<PathBuf>,
        config: RetrievalConfig,
        notify_queue: Arc<MessageQueue>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            notify_queue,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn archive_path(&self, archive_id: &str) -> PathBuf {
        self.root.join(archive_id)
    }

    /// Store a blob in the cold tier, returning its opaque handle.
    pub async fn upload_archive(&self, bytes: &[u8]) -> Result<String> {
        let archive_id = Uuid::new_v4().to_string();
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.archive_path(&archive_id), bytes).await?;
        Ok(archive_id)
    }

    /// Start an asynchronous retrieval of an archived blob. Returns the
    /// retrieval job id immediately; the blob becomes readable once the
    /// completion notification fires.
    pub async fn initiate_retrieval(
        self: &Arc<Self>,
        archive_id: &str,
        tier: RetrievalTier,
        description: &str,
    ) -> Result<String> {
        match tokio::fs::metadata(self.archive_path(archive_id)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::ArchiveNotFound(archive_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let retrieval_job_id = Uuid::new_v4().to_string();
        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            if tier == RetrievalTier::Expedited {
                let in_flight = jobs
                    .values()
                    .filter(|j| j.tier == RetrievalTier::Expedited && !j.is_ready())
                    .count();
                if in_flight >= self.config.expedited_slots {
                    return Err(PipelineError::InsufficientCapacity);
                }
            }
            jobs.insert(
                retrieval_job_id.clone(),
                RetrievalJob {
                    id: retrieval_job_id.clone(),
                    archive_id: archive_id.to_string(),
                    tier,
                    description: description.to_string(),
                    output: None,
                },
            );
        }

        let delay = match tier {
            RetrievalTier::Expedited => self.config.expedited_delay,
            RetrievalTier::Standard => self.config.standard_delay,
        };
        let vault = Arc::clone(self);
        let job_id = retrieval_job_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            vault.complete_retrieval(&job_id).await;
        });

        Ok(retrieval_job_id)
    }

    /// Snapshot the archive bytes into the retrieval job and announce
    /// completion. The snapshot keeps the output readable even after the
    /// archive itself is deleted.
    async fn complete_retrieval(&self, retrieval_job_id: &str) {
        let archive_id = {
            let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            match jobs.get(retrieval_job_id) {
                Some(job) => job.archive_id.clone(),
                None => return,
            }
        };
        let bytes = match tokio::fs::read(self.archive_path(&archive_id)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    retrieval_job_id,
                    archive_id = %archive_id,
                    error = %e,
                    "retrieval failed, archive unreadable"
                );
                return;
            }
        };
        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(job) = jobs.get_mut(retrieval_job_id) {
                job.output = Some(bytes);
            }
        }
        tracing::info!(retrieval_job_id, archive_id = %archive_id, "retrieval complete");
        let notification = RestoreNotification {
            retrieval_job_id: retrieval_job_id.to_string(),
        };
        if let Err(e) = self.notify_queue.send(&notification) {
            tracing::error!(retrieval_job_id, error = %e, "cannot publish restore notification");
        }
    }

    /// Metadata of a retrieval job (archive handle, description, readiness).
    pub fn retrieval_job(&self, retrieval_job_id: &str) -> Result<RetrievalJob> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(retrieval_job_id)
            .cloned()
            .ok_or_else(|| PipelineError::RetrievalNotFound(retrieval_job_id.to_string()))
    }

    /// Bytes produced by a completed retrieval job.
    pub fn get_retrieval_output(&self, retrieval_job_id: &str) -> Result<Vec<u8>> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let job = jobs
            .get(retrieval_job_id)
            .ok_or_else(|| PipelineError::RetrievalNotFound(retrieval_job_id.to_string()))?;
        job.output
            .clone()
            .ok_or_else(|| PipelineError::RetrievalNotReady(retrieval_job_id.to_string()))
    }

    pub async fn delete_archive(&self, archive_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.archive_path(archive_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PipelineError::ArchiveNotFound(archive_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn archive_exists(&self, archive_id: &str) -> bool {
        tokio::fs::try_exists(self.archive_path(archive_id))
            .await
            .unwrap_or(false)
    }
}
