//! Runner failures

use thiserror::Error;

use tandem_core::error::{CycleError, PackageFailure, TandemError};

/// One task that returned an error
#[derive(Debug, Error)]
#[error("{package}: {error}")]
pub struct TaskFailure {
    /// Package the task ran for
    pub package: String,
    /// What went wrong
    pub error: TandemError,
}

impl TaskFailure {
    /// Flatten to the error-report form
    pub fn to_package_failure(&self) -> PackageFailure {
        PackageFailure {
            package: self.package.clone(),
            message: self.error.to_string(),
        }
    }
}

/// A run stopped because at least one task failed.
///
/// Tasks already in flight when the first failure happened were allowed
/// to finish; nothing new was started after it.
#[derive(Debug, Error)]
#[error("{} task(s) failed, first: {}", .failures.len(), .failures.first().map(|f| f.package.as_str()).unwrap_or("?"))]
pub struct RunFailure {
    /// Failed tasks in the order they finished
    pub failures: Vec<TaskFailure>,
    /// Packages whose task succeeded
    pub completed: Vec<String>,
    /// Packages whose task never ran
    pub skipped: Vec<String>,
}

impl RunFailure {
    /// The failure that stopped the run
    pub fn first(&self) -> Option<&TaskFailure> {
        self.failures.first()
    }
}

/// Why a run did not complete
#[derive(Debug, Error)]
pub enum RunError {
    /// Cycles were found and the policy rejects them; no task ran
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// One or more tasks failed
    #[error(transparent)]
    Failed(#[from] RunFailure),
}

impl From<RunError> for TandemError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Cycle(e) => TandemError::Cycle(e),
            RunError::Failed(mut f) if f.failures.len() == 1 => f.failures.remove(0).error,
            RunError::Failed(f) => TandemError::Other(f.to_string()),
        }
    }
}
