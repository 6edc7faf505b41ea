//! Queue message payloads.
//!
//! Field names on the wire are kept compatible with the upstream service so
//! that external producers (the web front-end, the results workflow) can keep
//! publishing the same JSON.

use serde::{Deserialize, Serialize};

/// Dispatch request for a newly submitted job (job-request queue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    pub user_id: String,
    pub input_file_name: String,
    #[serde(rename = "s3_inputs_bucket")]
    pub inputs_bucket: String,
    #[serde(rename = "s3_key_input_file")]
    pub input_key: String,
}

/// Request to demote a completed result to cold storage (archive-request queue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub job_id: String,
    pub user_id: String,
    #[serde(rename = "annot_file")]
    pub result_key: String,
}

/// Request to start retrieval of an archived result (thaw-request queue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThawRequest {
    pub job_id: String,
    pub user_id: String,
    #[serde(rename = "s3_key_result_file")]
    pub result_key: String,
    #[serde(rename = "results_file_archive_id")]
    pub archive_id: String,
}

/// Published by the archival tier when a retrieval job completes
/// (restore-notification queue). Carries only the retrieval job id; the
/// annotation job is correlated through the retrieval description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreNotification {
    #[serde(rename = "JobId")]
    pub retrieval_job_id: String,
}

/// Description attached to a retrieval job so its completion notification can
/// be correlated back to the annotation job without a separate lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDescription {
    pub job_id: String,
}

/// Completion handoff consumed by the notifier (results-ready queue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsReady {
    pub job_id: String,
    pub user_id: String,
    #[serde(rename = "annot_file")]
    pub result_key: String,
}
