//! Supervisor error types

use thiserror::Error;

/// Outcomes of supervised tasks that end a run
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A shutdown signal was received
    #[error("terminated by {signal}")]
    Terminated { signal: String },

    /// The run was canceled without a signal
    #[error("canceled")]
    Canceled,

    /// A runner returned an error
    #[error("failed to execute runner {runner}: {source:#}")]
    RunnerFailed {
        runner: String,
        #[source]
        source: anyhow::Error,
    },

    /// A runner panicked
    #[error("runner {runner} panicked: {message}")]
    RunnerPanicked { runner: String, message: String },

    /// A supervised task was aborted outside of panic containment
    #[error("supervised task aborted: {0}")]
    TaskAborted(String),
}

impl ServiceError {
    /// Sentinels mark an orderly end of a run and are not logged as failures.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Terminated { .. } | Self::Canceled)
    }
}
