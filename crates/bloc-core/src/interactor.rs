use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use bloc_job::SupervisorJob;

use crate::error::{HookError, LifecycleError};
use crate::inspect::{self, Action, ContainerId, SharedInspector};
use crate::lifecycle::{HookErrorPolicy, Hooks, Status};
use crate::notifier::{Lifecycle, Notifier};
use crate::observable::Subscription;
use crate::options::InteractorOptions;
use crate::source::{Source, SourceSet, State, Subscriptions, release_all};

type Computed<T, D> = fn(&T, &<D as SourceSet>::States) -> T;

/// Observable state derived from its own updates and a fixed, ordered set of
/// dependencies.
///
/// The `computed` projection folds the dependencies' states into the
/// interactor's state. While observed, the interactor stays subscribed to
/// every dependency and re-emits whenever one of them changes.
/// [`Interactor::state`] recomputes the projection on every read, so it
/// never returns a stale value, even to observers a dependency notifies
/// before the interactor itself.
///
/// ```ignore
/// let session = Interactor::builder(Session::default(), (user.clone(),))
///     .name("Session")
///     .computed(|s, (user,)| Session { signed_in: user.id.is_some(), ..s.clone() })
///     .build();
/// ```
pub struct Interactor<T: State, D: SourceSet = ()>(Rc<InteractorInner<T, D>>);

struct InteractorInner<T: State, D: SourceSet> {
    id: ContainerId,
    notifier: Notifier<T>,
    dependencies: D,
    computed: Option<Computed<T, D>>,
    hook_errors: HookErrorPolicy,
    inspector: Option<SharedInspector>,
    hooks: Hooks<Interactor<T, D>>,
    started: Cell<bool>,
    links: RefCell<Subscriptions>,
    scope: SupervisorJob,
}

impl<T: State, D: SourceSet> Clone for Interactor<T, D> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: State, D: SourceSet> fmt::Debug for Interactor<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interactor")
            .field("id", &self.0.id)
            .field("state", &self.state())
            .field("dependencies", &D::LEN)
            .field("status", &self.status())
            .finish()
    }
}

pub struct InteractorBuilder<T: State, D: SourceSet> {
    initial: T,
    dependencies: D,
    options: InteractorOptions,
    computed: Option<Computed<T, D>>,
    hooks: Hooks<Interactor<T, D>>,
}

impl<T: State, D: SourceSet> InteractorBuilder<T, D> {
    pub fn options(mut self, options: InteractorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.name(name);
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

    /// Pure projection of the state and the dependencies' states into the
    /// next state.
    pub fn computed(mut self, computed: fn(&T, &D::States) -> T) -> Self {
        self.computed = Some(computed);
        self
    }

    pub fn on_start(
        mut self,
        f: impl Fn(&Interactor<T, D>) -> Result<(), HookError> + 'static,
    ) -> Self {
        self.hooks = self.hooks.on_start(f);
        self
    }

    pub fn on_dispose(
        mut self,
        f: impl Fn(&Interactor<T, D>) -> Result<(), HookError> + 'static,
    ) -> Self {
        self.hooks = self.hooks.on_dispose(f);
        self
    }

    pub fn build(self) -> Interactor<T, D> {
        let InteractorBuilder {
            initial,
            dependencies,
            options,
            computed,
            hooks,
        } = self;
        let first = match computed {
            Some(f) => f(&initial, &dependencies.states()),
            None => initial,
        };
        let interactor = Interactor(Rc::new(InteractorInner {
            id: ContainerId::new("Interactor", options.name),
            notifier: Notifier::new(first),
            dependencies,
            computed,
            hook_errors: options.hook_errors,
            inspector: options.inspector,
            hooks,
            started: Cell::new(false),
            links: RefCell::default(),
            scope: SupervisorJob::new(),
        }));
        interactor.report(Action::Created);
        interactor
    }
}

impl<T: State, D: SourceSet> Interactor<T, D> {
    pub fn new(initial: T, dependencies: D) -> Self {
        Self::builder(initial, dependencies).build()
    }

    pub fn builder(initial: T, dependencies: D) -> InteractorBuilder<T, D> {
        InteractorBuilder {
            initial,
            dependencies,
            options: InteractorOptions::default(),
            computed: None,
            hooks: Hooks::new(),
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.0.id
    }

    pub fn dependencies(&self) -> &D {
        &self.0.dependencies
    }

    /// Current state. With dependencies, the projection is recomputed from
    /// their current states on every call.
    pub fn state(&self) -> T {
        let stored = self.0.notifier.get();
        if D::LEN > 0 {
            self.project(&stored)
        } else {
            stored
        }
    }

    /// Replaces the state with the projection of `updater(current)` and
    /// notifies observers if it changed.
    pub fn update(&self, updater: impl FnOnce(&T) -> T) {
        let next = self.project(&updater(&self.state()));
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

    /// Owned job scope. Its children are cancelled whenever the interactor
    /// is disposed.
    pub fn scope(&self) -> &SupervisorJob {
        &self.0.scope
    }

    fn project(&self, state: &T) -> T {
        match self.0.computed {
            Some(f) => f(state, &self.0.dependencies.states()),
            None => state.clone(),
        }
    }

    /// Re-applies the projection to the stored state after a dependency
    /// changed.
    fn refresh(&self) {
        let next = self.project(&self.0.notifier.get());
        if self.0.notifier.emit(next) {
            self.report(Action::Update);
        }
    }

    fn link(&self) -> Result<(), LifecycleError> {
        let weak: Weak<InteractorInner<T, D>> = Rc::downgrade(&self.0);
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Interactor(inner).refresh();
            }
        });
        let links = self.0.dependencies.subscribe_all(on_change, true)?;
        log::trace!("{}: linked {} dependencies", self.0.id, links.len());
        *self.0.links.borrow_mut() = links;
        Ok(())
    }

    fn unlink(&self) -> Result<(), LifecycleError> {
        let links = std::mem::take(&mut *self.0.links.borrow_mut());
        if !links.is_empty() {
            log::trace!("{}: unlinking {} dependencies", self.0.id, links.len());
        }
        release_all(links)
    }

    fn report(&self, action: Action) {
        let inner = &self.0;
        inner
            .notifier
            .with(|state| inspect::report(inner.inspector.as_ref(), &inner.id, action, state));
    }
}

impl<T: State, D: SourceSet> Lifecycle for Interactor<T, D> {
    fn start(&self) -> Result<(), LifecycleError> {
        let inner = &self.0;
        log::debug!("{}: starting", inner.id);
        inner.started.set(true);
        if D::LEN > 0 {
            inner.notifier.emit(self.project(&inner.notifier.get()));
        }

        let started = self
            .link()
            .and_then(|()| inner.hooks.run_start(self, inner.id.name(), inner.hook_errors));
        match started {
            Ok(()) => self.report(Action::Start),
            Err(_) => {
                inner.started.set(false);
                if let Err(err) = self.unlink() {
                    log::warn!("{}: error while unlinking after failed start: {err}", inner.id);
                }
            }
        }
        started
    }

    fn dispose(&self) -> Result<(), LifecycleError> {
        let inner = &self.0;
        log::debug!("{}: disposing", inner.id);
        inner.started.set(false);

        let unlinked = self.unlink();
        let children = inner.scope.cancel_children();
        if children > 0 {
            log::trace!("{}: cancelled {children} scoped jobs", inner.id);
        }

        let disposed = inner
            .hooks
            .run_dispose(self, inner.id.name(), inner.hook_errors);
        self.report(Action::Dispose);
        unlinked.and(disposed)
    }
}

impl<T: State, D: SourceSet> Source for Interactor<T, D> {
    type State = T;

    fn state(&self) -> T {
        Interactor::state(self)
    }

    fn subscribe<F>(&self, observer: F) -> Result<Subscription, LifecycleError>
    where
        F: Fn(&T) + 'static,
    {
        Interactor::subscribe(self, observer)
    }
}
