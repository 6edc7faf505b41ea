use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the annotation algorithm invocation.
///
/// The algorithm itself is an external collaborator: given an input file it
/// must produce `<base>.annot.vcf` and `<base>.vcf.count.log` next to it.
#[derive(Debug, Clone)]
pub enum EngineConfig {
    /// Run an external command as `program [args...] <input>` with the
    /// working directory set to the job directory.
    Command { program: String, args: Vec<String> },
    /// Built-in engine that copies the input as the result artifact and
    /// writes a line-count log. Useful for local runs and tests.
    PassThrough,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::PassThrough
    }
}

/// Message queue delivery parameters shared by all queues.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Upper bound for a single long-poll receive
    pub wait_time: Duration,
    /// How long a delivered message stays hidden before redelivery
    pub visibility_timeout: Duration,
    /// Maximum messages returned by one receive
    pub max_messages: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_secs(10),
            visibility_timeout: Duration::from_secs(30),
            max_messages: 10,
        }
    }
}

/// On-disk layout and bucket naming for the storage tiers.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for hot object storage (one subdirectory per bucket)
    pub data_dir: PathBuf,
    /// Root directory for per-job local working directories
    pub jobs_dir: PathBuf,
    /// Directory holding cold (archival) blobs
    pub vault_dir: PathBuf,
    pub inputs_bucket: String,
    pub results_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            jobs_dir: PathBuf::from("./jobs"),
            vault_dir: PathBuf::from("./vault"),
            inputs_bucket: "annolite-inputs".to_string(),
            results_bucket: "annolite-results".to_string(),
        }
    }
}

/// Cold-tier retrieval behavior.
///
/// Retrieval is asynchronous: an initiated retrieval completes after the
/// per-tier delay, at which point a restore notification is published.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Concurrent expedited retrievals allowed before capacity errors
    pub expedited_slots: usize,
    pub expedited_delay: Duration,
    pub standard_delay: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            expedited_slots: 2,
            expedited_delay: Duration::from_secs(5),
            standard_delay: Duration::from_secs(30),
        }
    }
}

/// Immutable service configuration, built once at startup and passed into
/// every component. Handler logic never reads ambient global state.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub retrieval: RetrievalConfig,
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Configuration with all on-disk state rooted under a single directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            storage: StorageConfig {
                data_dir: root.join("data"),
                jobs_dir: root.join("jobs"),
                vault_dir: root.join("vault"),
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}
