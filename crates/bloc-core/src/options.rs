use crate::inspect::SharedInspector;
use crate::lifecycle::HookErrorPolicy;

/// Construction-time settings of a [`Bloc`](crate::Bloc).
#[derive(Clone, Default)]
pub struct BlocOptions {
    pub(crate) name: Option<String>,
    pub(crate) persist_state_on_dispose: bool,
    pub(crate) hook_errors: HookErrorPolicy,
    pub(crate) inspector: Option<SharedInspector>,
}

impl BlocOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in logs and inspector labels. Defaults to `"Bloc"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Keep the current state when the last observer leaves instead of
    /// resetting to the initial state.
    pub fn persist_state_on_dispose(mut self, persist: bool) -> Self {
        self.persist_state_on_dispose = persist;
        self
    }

    pub fn hook_errors(mut self, policy: HookErrorPolicy) -> Self {
        self.hook_errors = policy;
        self
    }

    pub fn inspector(mut self, inspector: SharedInspector) -> Self {
        self.inspector = Some(inspector);
        self
    }
}

/// Construction-time settings of an [`Interactor`](crate::Interactor).
#[derive(Clone, Default)]
pub struct InteractorOptions {
    pub(crate) name: Option<String>,
    pub(crate) hook_errors: HookErrorPolicy,
    pub(crate) inspector: Option<SharedInspector>,
}

impl InteractorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in logs and inspector labels. Defaults to `"Interactor"`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn hook_errors(mut self, policy: HookErrorPolicy) -> Self {
        self.hook_errors = policy;
        self
    }

    pub fn inspector(mut self, inspector: SharedInspector) -> Self {
        self.inspector = Some(inspector);
        self
    }
}
