use thiserror::Error;

/// Failures of the worker pool itself, as opposed to input or I/O errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("phase barrier was broken by a failed worker")]
    BarrierBroken,

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("worker count must be greater than 0")]
    InvalidWorkerCount,

    #[error("{0} was not published before it was needed")]
    MissingPhaseOutput(&'static str),
}
