pub mod config;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod profiles;
pub mod shutdown;
pub mod store;
pub mod submit;
pub mod worker;

pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
