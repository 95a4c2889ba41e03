pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod types;

pub use error::{PipelineError, Result};
pub use pipeline::{run, Destination, DestinationConfig, LoadInfo, Loader, Pipeline, RunSummary};
