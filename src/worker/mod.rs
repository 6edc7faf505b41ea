pub mod annotator;
pub mod archiver;
pub mod dispatcher;
pub mod notifier;
pub mod restore;
pub mod thaw;

pub use annotator::{result_artifacts, AnnotationWorker, JobContext};
pub use archiver::ArchivalSweeper;
pub use dispatcher::Dispatcher;
pub use notifier::Notifier;
pub use restore::{handle_restore, RestoreTrigger};
pub use thaw::{request_thaw, ThawInitiator};
