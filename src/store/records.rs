//! Durable keyed store for job records.
//!
//! Multiple worker instances coordinate exclusively through this store, so
//! every mutation that matters for correctness takes the expected previous
//! state explicitly and applies atomically under the write lock. There are
//! no read-modify-write cycles in the workers.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Annotation job lifecycle status. The order is total and transitions only
/// move forward: PENDING -> RUNNING -> COMPLETED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Archival state of a completed result. Absent means the result is still in
/// hot storage (or was never archived).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchivalStatus {
    Archived,
    Thawing,
    Restored,
}

impl std::fmt::Display for ArchivalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchivalStatus::Archived => write!(f, "ARCHIVED"),
            ArchivalStatus::Thawing => write!(f, "THAWING"),
            ArchivalStatus::Restored => write!(f, "RESTORED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub user_id: String,
    pub input_file_name: String,
    #[serde(rename = "s3_inputs_bucket")]
    pub inputs_bucket: String,
    #[serde(rename = "s3_key_input_file")]
    pub input_key: String,
    pub submit_time: DateTime<Utc>,
    pub job_status: JobStatus,
    #[serde(rename = "s3_results_bucket", skip_serializing_if = "Option::is_none")]
    pub results_bucket: Option<String>,
    #[serde(rename = "s3_key_result_file", skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
    #[serde(rename = "s3_key_log_file", skip_serializing_if = "Option::is_none")]
    pub log_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_file_archive_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archival_status: Option<ArchivalStatus>,
}

impl JobRecord {
    pub fn new(
        job_id: impl Into<String>,
        user_id: impl Into<String>,
        input_file_name: impl Into<String>,
        inputs_bucket: impl Into<String>,
        input_key: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            user_id: user_id.into(),
            input_file_name: input_file_name.into(),
            inputs_bucket: inputs_bucket.into(),
            input_key: input_key.into(),
            submit_time: Utc::now(),
            job_status: JobStatus::Pending,
            results_bucket: None,
            result_key: None,
            log_key: None,
            complete_time: None,
            results_file_archive_id: None,
            archival_status: None,
        }
    }
}

/// Keyed record store with conditional updates.
#[derive(Debug, Default)]
pub struct JobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, record: JobRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(record.job_id.clone(), record);
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(job_id).cloned()
    }

    /// All records for a user, ordered by submission time (the user_id index
    /// query of the record store interface).
    pub fn jobs_for_user(&self, user_id: &str) -> Vec<JobRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<JobRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|r| r.submit_time);
        jobs
    }

    /// Conditional status transition. Applies only when the current status
    /// equals `expected`; a concurrent duplicate dispatch loses the race and
    /// gets a `Precondition` error instead of corrupting the status.
    pub fn transition_status(
        &self,
        job_id: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        if record.job_status != expected {
            return Err(PipelineError::Precondition {
                job_id: job_id.to_string(),
                expected: expected.to_string(),
                actual: record.job_status.to_string(),
            });
        }
        // Status is monotonic; backward transitions are rejected outright.
        if next < record.job_status {
            return Err(PipelineError::Precondition {
                job_id: job_id.to_string(),
                expected: format!("status at or after {}", record.job_status),
                actual: next.to_string(),
            });
        }
        record.job_status = next;
        Ok(())
    }

    /// Atomic multi-attribute completion update: result and log references,
    /// completion time, and COMPLETED status in one write.
    pub fn complete(
        &self,
        job_id: &str,
        results_bucket: &str,
        result_key: &str,
        log_key: &str,
        complete_time: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        record.results_bucket = Some(results_bucket.to_string());
        record.result_key = Some(result_key.to_string());
        record.log_key = Some(log_key.to_string());
        record.complete_time = Some(complete_time);
        record.job_status = JobStatus::Completed;
        Ok(())
    }

    /// Record the cold-storage handle for a completed job and mark it
    /// ARCHIVED. Rejected unless the job is COMPLETED: an archive id must
    /// never appear on an unfinished job.
    pub fn record_archive(&self, job_id: &str, archive_id: &str) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        if record.job_status != JobStatus::Completed {
            return Err(PipelineError::Precondition {
                job_id: job_id.to_string(),
                expected: JobStatus::Completed.to_string(),
                actual: record.job_status.to_string(),
            });
        }
        record.results_file_archive_id = Some(archive_id.to_string());
        record.archival_status = Some(ArchivalStatus::Archived);
        Ok(())
    }

    pub fn mark_thawing(&self, job_id: &str) -> Result<()> {
        self.set_archival_status(job_id, ArchivalStatus::Thawing)
    }

    pub fn mark_restored(&self, job_id: &str) -> Result<()> {
        self.set_archival_status(job_id, ArchivalStatus::Restored)
    }

    /// THAWING and RESTORED only make sense for jobs that actually have an
    /// archive handle.
    fn set_archival_status(&self, job_id: &str, status: ArchivalStatus) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        if record.results_file_archive_id.is_none() {
            return Err(PipelineError::Precondition {
                job_id: job_id.to_string(),
                expected: "archive id present".to_string(),
                actual: "absent".to_string(),
            });
        }
        record.archival_status = Some(status);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
