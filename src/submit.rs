//! Submission collaborator interface: creates the PENDING job record, stages
//! the input object, and publishes the dispatch request. The web front-end
//! that normally drives this is out of scope; the same entry point serves
//! the CLI and tests.

use std::path::Path;

use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::messages::JobRequest;
use crate::store::{JobRecord, JobStore, MessageQueue, ObjectStore};

#[derive(Debug, Clone)]
pub struct Submission {
    pub job_id: String,
    pub input_key: String,
}

pub async fn submit_job(
    input: &Path,
    user_id: &str,
    inputs_bucket: &str,
    objects: &ObjectStore,
    records: &JobStore,
    job_queue: &MessageQueue,
) -> Result<Submission> {
    let input_file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::InvalidInput(input.display().to_string()))?
        .to_string();

    let job_id = Uuid::new_v4().to_string();
    let input_key = format!("{user_id}/{job_id}~{input_file_name}");

    objects.upload_file(input, inputs_bucket, &input_key).await?;

    records.put(JobRecord::new(
        &job_id,
        user_id,
        &input_file_name,
        inputs_bucket,
        &input_key,
    ));

    job_queue.send(&JobRequest {
        job_id: job_id.clone(),
        user_id: user_id.to_string(),
        input_file_name,
        inputs_bucket: inputs_bucket.to_string(),
        input_key: input_key.clone(),
    })?;

    tracing::info!(job_id = %job_id, user_id, "job submitted");
    Ok(Submission { job_id, input_key })
}
