pub mod objects;
pub mod queue;
pub mod records;
pub mod vault;

pub use objects::ObjectStore;
pub use queue::{Message, MessageQueue};
pub use records::{ArchivalStatus, JobRecord, JobStatus, JobStore};
pub use vault::{ArchiveVault, RetrievalJob, RetrievalTier};
