//! Job dispatcher: consumes the job-request queue, stages inputs, and
//! launches annotation workers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::messages::JobRequest;
use crate::store::queue::Message;
use crate::store::{JobStatus, JobStore, MessageQueue, ObjectStore};
use crate::worker::annotator::{AnnotationWorker, JobContext};

pub struct Dispatcher {
    queue: Arc<MessageQueue>,
    objects: Arc<ObjectStore>,
    records: Arc<JobStore>,
    worker: Arc<AnnotationWorker>,
    jobs_dir: PathBuf,
    max_messages: usize,
    wait_time: Duration,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<MessageQueue>,
        objects: Arc<ObjectStore>,
        records: Arc<JobStore>,
        worker: Arc<AnnotationWorker>,
        jobs_dir: PathBuf,
        max_messages: usize,
        wait_time: Duration,
    ) -> Self {
        Self {
            queue,
            objects,
            records,
            worker,
            jobs_dir,
            max_messages,
            wait_time,
        }
    }

    /// Long-poll loop. A message is acknowledged only after the job has been
    /// staged and handed off (or deliberately abandoned); everything else is
    /// left for redelivery.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("dispatcher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("dispatcher shutting down");
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
        let request: JobRequest = match message.payload() {
            Ok(request) => request,
            Err(e) => {
                // Not acknowledged: left for redelivery / poison handling.
                tracing::warn!(error = %e, "malformed job request");
                return;
            }
        };

        // Idempotent: a redelivered request reuses the same directory.
        let job_dir = self.jobs_dir.join(&request.job_id);
        if let Err(e) = tokio::fs::create_dir_all(&job_dir).await {
            tracing::error!(job_id = %request.job_id, error = %e, "cannot create job directory");
            return;
        }

        let input_path = job_dir.join(&request.input_file_name);
        if let Err(e) = self
            .objects
            .download_file(&request.inputs_bucket, &request.input_key, &input_path)
            .await
        {
            // Abandon rather than retry indefinitely: the message is deleted
            // even though the job never ran.
            tracing::error!(
                job_id = %request.job_id,
                input_key = %request.input_key,
                error = %e,
                "cannot stage input file, abandoning job"
            );
            self.queue.delete(&message.receipt_handle);
            return;
        }

        // Launch the worker as an independent task so its failure cannot
        // crash the dispatch loop.
        let worker = Arc::clone(&self.worker);
        let ctx = JobContext {
            job_id: request.job_id.clone(),
            user_id: request.user_id.clone(),
            input_file_name: request.input_file_name.clone(),
            job_dir,
        };
        let job_id = request.job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.process(ctx).await {
                tracing::error!(job_id = %job_id, error = %e, "annotation job failed");
            }
        });

        // Conditional PENDING -> RUNNING transition. This is the sole
        // duplicate-dispatch suppression: a redelivered message can spawn a
        // second worker, but only one transition ever applies.
        match self
            .records
            .transition_status(&request.job_id, JobStatus::Pending, JobStatus::Running)
        {
            Ok(()) => {
                tracing::info!(job_id = %request.job_id, user_id = %request.user_id, "job dispatched");
            }
            Err(e) => {
                tracing::warn!(job_id = %request.job_id, error = %e, "job not transitioned to RUNNING");
            }
        }

        self.queue.delete(&message.receipt_handle);
    }
}
