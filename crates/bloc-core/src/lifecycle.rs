use crate::error::{HookError, LifecycleError};

/// `Idle` while nobody observes a container, `Started` otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Started,
}

/// What a container does when one of its lifecycle hooks fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HookErrorPolicy {
    /// Return the error from `subscribe` (start) or `Subscription::unsubscribe` (dispose).
    #[default]
    Propagate,
    /// Log the error and carry on as if the hook succeeded.
    Log,
}

type Hook<C> = Box<dyn Fn(&C) -> Result<(), HookError>>;

/// Optional start/dispose callbacks for a container of type `C`.
///
/// Hooks run after the container's own bookkeeping: `on_start` once
/// dependencies are connected, `on_dispose` once effects and scoped jobs have
/// been cancelled.
pub struct Hooks<C> {
    on_start: Option<Hook<C>>,
    on_dispose: Option<Hook<C>>,
}

impl<C> Default for Hooks<C> {
    fn default() -> Self {
        Self {
            on_start: None,
            on_dispose: None,
        }
    }
}

impl<C> Hooks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, f: impl Fn(&C) -> Result<(), HookError> + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_dispose(mut self, f: impl Fn(&C) -> Result<(), HookError> + 'static) -> Self {
        self.on_dispose = Some(Box::new(f));
        self
    }

    pub(crate) fn run_start(
        &self,
        container: &C,
        name: &str,
        policy: HookErrorPolicy,
    ) -> Result<(), LifecycleError> {
        let Some(hook) = &self.on_start else {
            return Ok(());
        };
        settle(hook(container), name, "on_start", policy).map_err(|source| {
            LifecycleError::Start {
                container: name.to_string(),
                source,
            }
        })
    }

    pub(crate) fn run_dispose(
        &self,
        container: &C,
        name: &str,
        policy: HookErrorPolicy,
    ) -> Result<(), LifecycleError> {
        let Some(hook) = &self.on_dispose else {
            return Ok(());
        };
        settle(hook(container), name, "on_dispose", policy).map_err(|source| {
            LifecycleError::Dispose {
                container: name.to_string(),
                source,
            }
        })
    }
}

fn settle(
    result: Result<(), HookError>,
    name: &str,
    hook: &str,
    policy: HookErrorPolicy,
) -> Result<(), HookError> {
    match (result, policy) {
        (Ok(()), _) => Ok(()),
        (Err(err), HookErrorPolicy::Propagate) => Err(err),
        (Err(err), HookErrorPolicy::Log) => {
            log::error!("{name}: {hook} hook failed: {err}");
            Ok(())
        }
    }
}
