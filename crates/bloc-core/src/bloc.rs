use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bloc_job::{JobTask, SupervisorJob};

use crate::effect::{self, Effect, EffectKey, EffectRegistry, EffectStatus};
use crate::error::{HookError, LifecycleError};
use crate::inspect::{self, Action, ContainerId, SharedInspector};
use crate::lifecycle::{HookErrorPolicy, Hooks, Status};
use crate::notifier::{Lifecycle, Notifier};
use crate::observable::Subscription;
use crate::options::BlocOptions;
use crate::source::{Source, State};

/// An isolated slice of observable state with keyed, cancellable effects.
///
/// State only changes through [`Bloc::update`]. Observers get the current
/// state on subscribe and then every distinct change. The first observer
/// starts the bloc and the last one to leave disposes it: running effects
/// and scoped jobs are cancelled and, unless
/// [`persist_state_on_dispose`](BlocOptions::persist_state_on_dispose) is
/// set, the state goes back to its initial value.
///
/// Handles are cheap to clone and share one bloc.
pub struct Bloc<T: State>(Rc<BlocInner<T>>);

struct BlocInner<T: State> {
    id: ContainerId,
    notifier: Notifier<T>,
    initial: T,
    computed: Option<fn(&T) -> T>,
    persist_state_on_dispose: bool,
    hook_errors: HookErrorPolicy,
    inspector: Option<SharedInspector>,
    hooks: Hooks<Bloc<T>>,
    started: Cell<bool>,
    effects: Rc<RefCell<EffectRegistry>>,
    scope: SupervisorJob,
}

impl<T: State> Clone for Bloc<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: State> fmt::Debug for Bloc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bloc")
            .field("id", &self.0.id)
            .field("state", &self.0.notifier.get())
            .field("status", &self.status())
            .finish()
    }
}

pub struct BlocBuilder<T: State> {
    initial: T,
    options: BlocOptions,
    computed: Option<fn(&T) -> T>,
    hooks: Hooks<Bloc<T>>,
}

impl<T: State> BlocBuilder<T> {
    pub fn options(mut self, options: BlocOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.name(name);
        self
    }

    pub fn persist_state_on_dispose(mut self, persist: bool) -> Self {
        self.options = self.options.persist_state_on_dispose(persist);
        self
    }

    pub fn hook_errors(mut self, policy: HookErrorPolicy) -> Self {
        self.options = self.options.hook_errors(policy);
        self
    }

    pub fn inspector(mut self, inspector: SharedInspector) -> Self {
        self.options = self.options.inspector(inspector);
        self
    }

    /// Projection applied to the initial state, after every update and to
    /// the reset state on dispose.
    pub fn computed(mut self, computed: fn(&T) -> T) -> Self {
        self.computed = Some(computed);
        self
    }

    pub fn on_start(mut self, f: impl Fn(&Bloc<T>) -> Result<(), HookError> + 'static) -> Self {
        self.hooks = self.hooks.on_start(f);
        self
    }

    pub fn on_dispose(mut self, f: impl Fn(&Bloc<T>) -> Result<(), HookError> + 'static) -> Self {
        self.hooks = self.hooks.on_dispose(f);
        self
    }

    pub fn build(self) -> Bloc<T> {
        let BlocBuilder {
            initial,
            options,
            computed,
            hooks,
        } = self;
        let first = project(computed, initial.clone());
        let bloc = Bloc(Rc::new(BlocInner {
            id: ContainerId::new("Bloc", options.name),
            notifier: Notifier::new(first),
            initial,
            computed,
            persist_state_on_dispose: options.persist_state_on_dispose,
            hook_errors: options.hook_errors,
            inspector: options.inspector,
            hooks,
            started: Cell::new(false),
            effects: Rc::default(),
            scope: SupervisorJob::new(),
        }));
        bloc.report(Action::Created);
        bloc
    }
}

fn project<T>(computed: Option<fn(&T) -> T>, state: T) -> T {
    match computed {
        Some(f) => f(&state),
        None => state,
    }
}

impl<T: State> Bloc<T> {
    pub fn new(initial: T) -> Self {
        Self::builder(initial).build()
    }

    pub fn builder(initial: T) -> BlocBuilder<T> {
        BlocBuilder {
            initial,
            options: BlocOptions::default(),
            computed: None,
            hooks: Hooks::new(),
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.0.id
    }

    pub fn state(&self) -> T {
        self.0.notifier.get()
    }

    /// Reads the state without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.notifier.with(f)
    }

    /// Replaces the state with `updater(current)` and notifies observers if
    /// the result differs from the current state.
    pub fn update(&self, updater: impl FnOnce(&T) -> T) {
        let current = self.0.notifier.get();
        let next = project(self.0.computed, updater(&current));
        self.0.notifier.emit(next);
        self.report(Action::Update);
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&T) + 'static,
    ) -> Result<Subscription, LifecycleError> {
        self.0.notifier.subscribe(self.clone(), observer)
    }

    pub fn observer_count(&self) -> usize {
        self.0.notifier.observer_count()
    }

    pub fn status(&self) -> Status {
        if self.0.started.get() {
            Status::Started
        } else {
            Status::Idle
        }
    }

    /// Owned job scope. Its children are cancelled whenever the bloc is
    /// disposed.
    pub fn scope(&self) -> &SupervisorJob {
        &self.0.scope
    }

    /// Starts `effect` on the current `LocalSet`, cancelling whatever effect
    /// is still running under the same key.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `tokio::task::LocalSet`.
    pub fn effect<R: 'static, E: 'static>(&self, effect: Effect<R, E>) -> JobTask<R, E> {
        let key = effect.key().clone();
        let (task, replaced) = effect::launch(&self.0.effects, effect);
        if replaced {
            self.report(Action::EffectCancelled(key));
        }
        task
    }

    /// Requests cancellation of the effect under `key` and forgets it right
    /// away. Returns whether anything was registered.
    pub fn cancel_effect(&self, key: impl Into<EffectKey>) -> bool {
        let key = key.into();
        let cancelled = self.0.effects.borrow_mut().cancel(&key);
        if cancelled {
            self.report(Action::EffectCancelled(key));
        }
        cancelled
    }

    pub fn effect_status(&self, key: impl Into<EffectKey>) -> EffectStatus {
        self.0.effects.borrow().status(&key.into())
    }

    fn report(&self, action: Action) {
        let inner = &self.0;
        inner
            .notifier
            .with(|state| inspect::report(inner.inspector.as_ref(), &inner.id, action, state));
    }
}

impl<T: State> Lifecycle for Bloc<T> {
    fn start(&self) -> Result<(), LifecycleError> {
        let inner = &self.0;
        log::debug!("{}: starting", inner.id);
        inner.started.set(true);
        let started = inner
            .hooks
            .run_start(self, inner.id.name(), inner.hook_errors);
        match started {
            Ok(()) => self.report(Action::Start),
            Err(_) => inner.started.set(false),
        }
        started
    }

    fn dispose(&self) -> Result<(), LifecycleError> {
        let inner = &self.0;
        log::debug!("{}: disposing", inner.id);
        inner.started.set(false);

        let cancelled = inner.effects.borrow_mut().dispose();
        for key in cancelled {
            self.report(Action::EffectCancelled(key));
        }
        let children = inner.scope.cancel_children();
        if children > 0 {
            log::trace!("{}: cancelled {children} scoped jobs", inner.id);
        }
        if !inner.persist_state_on_dispose {
            inner
                .notifier
                .emit(project(inner.computed, inner.initial.clone()));
        }

        let disposed = inner
            .hooks
            .run_dispose(self, inner.id.name(), inner.hook_errors);
        self.report(Action::Dispose);
        disposed
    }
}

impl<T: State> Source for Bloc<T> {
    type State = T;

    fn state(&self) -> T {
        Bloc::state(self)
    }

    fn subscribe<F>(&self, observer: F) -> Result<Subscription, LifecycleError>
    where
        F: Fn(&T) + 'static,
    {
        Bloc::subscribe(self, observer)
    }
}
