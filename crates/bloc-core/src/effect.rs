use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use bloc_job::{Job, JobHandle, JobTask, Outcome};

/// Identifies an effect slot. Starting an effect under a key that is
/// already running cancels the running one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectKey(Cow<'static, str>);

impl EffectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for EffectKey {
    fn from(key: &'static str) -> Self {
        EffectKey(Cow::Borrowed(key))
    }
}

impl From<String> for EffectKey {
    fn from(key: String) -> Self {
        EffectKey(Cow::Owned(key))
    }
}

impl From<&EffectKey> for EffectKey {
    fn from(key: &EffectKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectStatus {
    Idle,
    Running,
}

type OnDone<R, E> = Box<dyn FnOnce(&Outcome<R, E>)>;

/// Description of an effect: its key, its body and how it reacts to disposal.
///
/// ```ignore
/// bloc.effect(
///     Effect::new("fetch", move |job| async move {
///         job.delay(Duration::from_millis(500)).await?;
///         Ok::<_, JobCancelled>(counter.increment())
///     })
///     .cancel_on_dispose(false),
/// );
/// ```
pub struct Effect<R, E> {
    key: EffectKey,
    job: Job<R, E>,
    cancel_on_dispose: bool,
    on_done: Option<OnDone<R, E>>,
}

impl<R: 'static, E: 'static> Effect<R, E> {
    pub fn new<F, Fut>(key: impl Into<EffectKey>, block: F) -> Self
    where
        F: FnOnce(JobHandle) -> Fut + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
    {
        Self {
            key: key.into(),
            job: Job::new(block),
            cancel_on_dispose: true,
            on_done: None,
        }
    }

    /// Whether disposing the container cancels this effect. Defaults to `true`.
    pub fn cancel_on_dispose(mut self, cancel: bool) -> Self {
        self.cancel_on_dispose = cancel;
        self
    }

    /// Called exactly once with the outcome, whether the effect succeeded,
    /// failed or was cancelled.
    pub fn on_done(mut self, f: impl FnOnce(&Outcome<R, E>) + 'static) -> Self {
        self.on_done = Some(Box::new(f));
        self
    }

    pub fn key(&self) -> &EffectKey {
        &self.key
    }
}

struct Entry {
    job: JobHandle,
    cancel_on_dispose: bool,
}

/// In-flight effects by key. At most one job is registered per key.
#[derive(Default)]
pub(crate) struct EffectRegistry {
    entries: HashMap<EffectKey, Entry>,
}

impl EffectRegistry {
    pub fn status(&self, key: &EffectKey) -> EffectStatus {
        match self.entries.get(key) {
            Some(entry) if entry.job.is_active() => EffectStatus::Running,
            _ => EffectStatus::Idle,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Requests cancellation of the job under `key` and forgets it without
    /// waiting for the job to acknowledge.
    pub fn cancel(&mut self, key: &EffectKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                log::trace!("cancelling effect {key}");
                entry.job.cancel();
                true
            }
            None => false,
        }
    }

    /// Registers `job` under `key`, cancelling the previous holder first.
    /// Returns whether a previous job was cancelled.
    fn register(&mut self, key: EffectKey, job: JobHandle, cancel_on_dispose: bool) -> bool {
        let replaced = self.cancel(&key);
        log::trace!("registering effect {key} ({})", job.id());
        self.entries.insert(
            key,
            Entry {
                job,
                cancel_on_dispose,
            },
        );
        replaced
    }

    /// Unregisters `key` only if it still refers to `job`; a later call may
    /// already have replaced it.
    fn release(&mut self, key: &EffectKey, job: &JobHandle) -> bool {
        let same = matches!(self.entries.get(key), Some(entry) if entry.job.ptr_eq(job));
        if same {
            self.entries.remove(key);
        }
        same
    }

    /// Cancels every effect registered with `cancel_on_dispose`. The others
    /// stay registered so they can still be cancelled by key.
    pub fn dispose(&mut self) -> Vec<EffectKey> {
        let mut cancelled = Vec::new();
        self.entries.retain(|key, entry| {
            if entry.cancel_on_dispose {
                entry.job.cancel();
                cancelled.push(key.clone());
                false
            } else {
                true
            }
        });
        cancelled
    }
}

/// Starts `effect` on the current `LocalSet` under its key.
///
/// Returns the running task and whether a previous effect under the same key
/// was cancelled to make room for it.
pub(crate) fn launch<R: 'static, E: 'static>(
    registry: &Rc<RefCell<EffectRegistry>>,
    effect: Effect<R, E>,
) -> (JobTask<R, E>, bool) {
    let Effect {
        key,
        job,
        cancel_on_dispose,
        on_done,
    } = effect;
    let handle = job.handle();
    let replaced = registry
        .borrow_mut()
        .register(key.clone(), handle.clone(), cancel_on_dispose);

    let weak = Rc::downgrade(registry);
    let task = job.run_with(move |outcome| {
        if let Some(registry) = weak.upgrade() {
            registry.borrow_mut().release(&key, &handle);
        }
        if let Some(on_done) = on_done {
            on_done(outcome);
        }
    });
    (task, replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloc_job::{JobCancelled, testing::run_local};
    use std::cell::Cell;
    use std::time::Duration;

    fn sleeper(key: &'static str, ms: u64, hits: Rc<Cell<u32>>) -> Effect<(), JobCancelled> {
        Effect::new(key, move |job| async move {
            job.delay(Duration::from_millis(ms)).await?;
            hits.set(hits.get() + 1);
            Ok::<_, JobCancelled>(())
        })
    }

    #[test]
    fn test_same_key_replaces_running_effect() {
        run_local(async {
            let registry = Rc::new(RefCell::new(EffectRegistry::default()));
            let hits = Rc::new(Cell::new(0));

            let (first, replaced) = launch(&registry, sleeper("fetch", 500, hits.clone()));
            assert!(!replaced);
            let (second, replaced) = launch(&registry, sleeper("fetch", 500, hits.clone()));
            assert!(replaced);
            assert_eq!(registry.borrow().len(), 1);

            assert!(first.await.unwrap_err().is_cancelled());
            assert!(second.await.is_ok());
            assert_eq!(hits.get(), 1);
            assert_eq!(registry.borrow().len(), 0);
        });
    }

    #[test]
    fn test_replaced_effect_does_not_unregister_successor() {
        run_local(async {
            let registry = Rc::new(RefCell::new(EffectRegistry::default()));
            let hits = Rc::new(Cell::new(0));
            let key = EffectKey::from("load");

            let (first, _) = launch(&registry, sleeper("load", 10, hits.clone()));
            let (second, _) = launch(&registry, sleeper("load", 500, hits.clone()));
            // The first job finishing must not remove the second's entry.
            assert!(first.await.is_err());
            assert_eq!(registry.borrow().status(&key), EffectStatus::Running);
            second.await.unwrap();
            assert_eq!(registry.borrow().status(&key), EffectStatus::Idle);
        });
    }

    #[test]
    fn test_dispose_keeps_opted_out_effects() {
        run_local(async {
            let registry = Rc::new(RefCell::new(EffectRegistry::default()));
            let hits = Rc::new(Cell::new(0));

            let (a, _) = launch(&registry, sleeper("a", 500, hits.clone()));
            let (b, _) = launch(
                &registry,
                sleeper("b", 500, hits.clone()).cancel_on_dispose(false),
            );

            let cancelled = registry.borrow_mut().dispose();
            assert_eq!(cancelled, vec![EffectKey::from("a")]);
            assert_eq!(registry.borrow().status(&"b".into()), EffectStatus::Running);

            assert!(a.await.unwrap_err().is_cancelled());
            assert!(b.await.is_ok());
            assert_eq!(hits.get(), 1);
        });
    }

    #[test]
    fn test_on_done_receives_outcome_once() {
        run_local(async {
            let registry = Rc::new(RefCell::new(EffectRegistry::default()));
            let outcomes = Rc::new(RefCell::new(Vec::new()));

            let o = outcomes.clone();
            let (task, _) = launch(
                &registry,
                sleeper("x", 500, Rc::new(Cell::new(0)))
                    .on_done(move |outcome| o.borrow_mut().push(Job::is_cancelled(outcome))),
            );
            registry.borrow_mut().cancel(&"x".into());
            assert!(task.await.is_err());
            assert_eq!(*outcomes.borrow(), vec![true]);
        });
    }
}
