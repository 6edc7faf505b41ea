use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("user profile not found: {0}")]
    ProfileNotFound(String),

    #[error("precondition failed for job {job_id}: expected {expected}, found {actual}")]
    Precondition {
        job_id: String,
        expected: String,
        actual: String,
    },

    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("retrieval job not found: {0}")]
    RetrievalNotFound(String),

    #[error("retrieval job not ready: {0}")]
    RetrievalNotReady(String),

    #[error("expedited retrieval capacity exhausted")]
    InsufficientCapacity,

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("annotation failed: {0}")]
    Annotation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
