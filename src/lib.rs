pub mod aggregate;
pub mod analyze;
pub mod args;
pub mod article;
pub mod barrier;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod sync;
pub mod utils;
pub mod worker;

pub use aggregate::{Aggregate, DuplicatePolicy};
pub use args::Args;
pub use error::PipelineError;
pub use pipeline::{execute, run, PipelineOptions};
pub use stats::{print_run_summary, RunSummary};
