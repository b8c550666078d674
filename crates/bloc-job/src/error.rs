use thiserror::Error;

/// Marker returned when a job stopped because cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("job was cancelled")]
pub struct JobCancelled;

#[derive(Debug, Error)]
pub enum JobError<E> {
    #[error(transparent)]
    Cancelled(#[from] JobCancelled),
    #[error("job failed: {0}")]
    Failed(E),
}

impl<E> JobError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled(_))
    }

    /// The body's own error, if the job failed rather than being cancelled.
    pub fn failure(&self) -> Option<&E> {
        match self {
            JobError::Failed(e) => Some(e),
            JobError::Cancelled(_) => None,
        }
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            JobError::Failed(e) => Some(e),
            JobError::Cancelled(_) => None,
        }
    }
}

/// Result of running a job to completion.
pub type Outcome<T, E> = Result<T, JobError<E>>;
