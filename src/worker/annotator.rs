//! Annotation worker: runs the annotation algorithm for one job and handles
//! completion (artifact upload, results workflow handoff, record update,
//! local cleanup).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::error::{PipelineError, Result};
use crate::messages::{ArchiveRequest, ResultsReady};
use crate::store::{JobStore, MessageQueue, ObjectStore};

/// Deterministic output artifact names for an input file: the results file
/// and the count log, both derived from the base name up to the first dot.
/// "sample.vcf" yields ("sample.annot.vcf", "sample.vcf.count.log").
pub fn result_artifacts(input_file_name: &str) -> (String, String) {
    let base = input_file_name
        .split('.')
        .next()
        .unwrap_or(input_file_name);
    (
        format!("{base}.annot.vcf"),
        format!("{base}.vcf.count.log"),
    )
}

/// Everything the worker needs to process one dispatched job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub user_id: String,
    pub input_file_name: String,
    pub job_dir: PathBuf,
}

/// Runs one annotation job to completion. Spawned by the dispatcher as an
/// independent task per job so an algorithm failure cannot take down the
/// dispatch loop.
#[derive(Debug)]
pub struct AnnotationWorker {
    engine: EngineConfig,
    objects: Arc<ObjectStore>,
    records: Arc<JobStore>,
    results_queue: Arc<MessageQueue>,
    archive_queue: Arc<MessageQueue>,
    results_bucket: String,
}

impl AnnotationWorker {
    pub fn new(
        engine: EngineConfig,
        objects: Arc<ObjectStore>,
        records: Arc<JobStore>,
        results_queue: Arc<MessageQueue>,
        archive_queue: Arc<MessageQueue>,
        results_bucket: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            objects,
            records,
            results_queue,
            archive_queue,
            results_bucket: results_bucket.into(),
        }
    }

    /// Run the algorithm and the completion sequence, then remove the job's
    /// working directory as terminal cleanup regardless of outcome.
    pub async fn process(&self, ctx: JobContext) -> Result<()> {
        let outcome = self.run_job(&ctx).await;
        if let Err(e) = tokio::fs::remove_dir_all(&ctx.job_dir).await {
            tracing::warn!(job_id = %ctx.job_id, error = %e, "cannot remove job directory");
        }
        outcome
    }

    async fn run_job(&self, ctx: &JobContext) -> Result<()> {
        let input_path = ctx.job_dir.join(&ctx.input_file_name);
        self.run_engine(&input_path).await?;

        let (annot_name, log_name) = result_artifacts(&ctx.input_file_name);
        let result_key = format!("{}/{}/{}", ctx.user_id, ctx.job_id, annot_name);
        let log_key = format!("{}/{}/{}", ctx.user_id, ctx.job_id, log_name);

        // Either upload failing is fatal; no partial-state repair.
        self.objects
            .upload_file(&ctx.job_dir.join(&annot_name), &self.results_bucket, &result_key)
            .await?;
        self.objects
            .upload_file(&ctx.job_dir.join(&log_name), &self.results_bucket, &log_key)
            .await?;

        // Completion fan-out to the results workflow and the archival
        // sweeper. Non-fatal: the record update below is the authoritative
        // completion signal.
        let handoff = ResultsReady {
            job_id: ctx.job_id.clone(),
            user_id: ctx.user_id.clone(),
            result_key: result_key.clone(),
        };
        if let Err(e) = self.results_queue.send(&handoff) {
            tracing::warn!(job_id = %ctx.job_id, error = %e, "cannot start results workflow");
        }
        let archive = ArchiveRequest {
            job_id: ctx.job_id.clone(),
            user_id: ctx.user_id.clone(),
            result_key: result_key.clone(),
        };
        if let Err(e) = self.archive_queue.send(&archive) {
            tracing::warn!(job_id = %ctx.job_id, error = %e, "cannot request archival");
        }

        // Fatal on failure: no other component learns the job finished.
        self.records.complete(
            &ctx.job_id,
            &self.results_bucket,
            &result_key,
            &log_key,
            Utc::now(),
        )?;

        tracing::info!(
            job_id = %ctx.job_id,
            user_id = %ctx.user_id,
            result_key = %result_key,
            "annotation job completed"
        );
        Ok(())
    }

    async fn run_engine(&self, input: &Path) -> Result<()> {
        match &self.engine {
            EngineConfig::Command { program, args } => {
                Self::run_command(program, args, input).await
            }
            EngineConfig::PassThrough => Self::run_pass_through(input).await,
        }
    }

    /// Invoke the external algorithm synchronously, cwd set to the job
    /// directory.
    async fn run_command(program: &str, args: &[String], input: &Path) -> Result<()> {
        let cwd = input
            .parent()
            .ok_or_else(|| PipelineError::InvalidInput(input.display().to_string()))?;
        let output = Command::new(program)
            .args(args)
            .arg(input)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PipelineError::Annotation(if stderr.is_empty() {
                format!("exit code: {:?}", output.status.code())
            } else {
                stderr.into_owned()
            }))
        }
    }

    /// Built-in engine: the result is a copy of the input, the log records
    /// the record count.
    async fn run_pass_through(input: &Path) -> Result<()> {
        let file_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::InvalidInput(input.display().to_string()))?;
        let dir = input
            .parent()
            .ok_or_else(|| PipelineError::InvalidInput(input.display().to_string()))?;
        let contents = tokio::fs::read(input).await?;
        let (annot_name, log_name) = result_artifacts(file_name);
        tokio::fs::write(dir.join(annot_name), &contents).await?;
        let records = contents.split(|&b| b == b'\n').filter(|l| !l.is_empty()).count();
        let log = format!("processed {records} records\n");
        tokio::fs::write(dir.join(log_name), log).await?;
        Ok(())
    }
}
