use thiserror::Error;

/// Error type returned by user lifecycle hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{container}: on_start hook failed")]
    Start {
        container: String,
        #[source]
        source: HookError,
    },
    #[error("{container}: on_dispose hook failed")]
    Dispose {
        container: String,
        #[source]
        source: HookError,
    },
}

impl LifecycleError {
    pub fn container(&self) -> &str {
        match self {
            LifecycleError::Start { container, .. } | LifecycleError::Dispose { container, .. } => {
                container
            }
        }
    }
}
