use std::cell::RefCell;

use crate::error::LifecycleError;
use crate::observable::{Subject, Subscription};

/// Idle/started transitions of whatever owns a [`Notifier`].
pub trait Lifecycle: 'static {
    /// Called on the 0 -> 1 observer transition, before the new observer
    /// receives its first value.
    fn start(&self) -> Result<(), LifecycleError>;

    /// Called on the 1 -> 0 observer transition.
    fn dispose(&self) -> Result<(), LifecycleError>;
}

/// A [`Subject`] that only delivers values that differ from the previous one
/// and drives a [`Lifecycle`] from its observer count.
pub struct Notifier<T> {
    subject: Subject<T>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Notifier<T> {
    pub fn new(initial: T) -> Self {
        Self {
            subject: Subject::new(initial),
        }
    }

    pub fn get(&self) -> T {
        self.subject.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.subject.with(f)
    }

    pub fn observer_count(&self) -> usize {
        self.subject.observer_count()
    }

    /// Stores `value` and delivers it to observers unless it equals the
    /// current value. Returns whether anything changed.
    pub fn emit(&self, value: T) -> bool {
        if self.subject.with(|current| *current == value) {
            return false;
        }
        self.subject.set(value);
        true
    }

    pub fn subscribe<L: Lifecycle>(
        &self,
        lifecycle: L,
        observer: impl Fn(&T) + 'static,
    ) -> Result<Subscription, LifecycleError> {
        if self.subject.observer_count() == 0 {
            lifecycle.start()?;
        }
        let key = self.subject.subscribe(observer);
        let subject = self.subject.clone();
        Ok(Subscription::new(move || {
            if subject.unsubscribe(key) && subject.observer_count() == 0 {
                lifecycle.dispose()
            } else {
                Ok(())
            }
        }))
    }
}

/// Per-stream equality gate: admits a value only if it differs from the
/// last admitted one.
pub struct Distinct<T> {
    last: RefCell<Option<T>>,
}

impl<T> Default for Distinct<T> {
    fn default() -> Self {
        Self {
            last: RefCell::new(None),
        }
    }
}

impl<T: Clone + PartialEq> Distinct<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, value: &T) -> bool {
        let mut last = self.last.borrow_mut();
        if last.as_ref() == Some(value) {
            return false;
        }
        *last = Some(value.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Counts {
        started: Rc<Cell<u32>>,
        disposed: Rc<Cell<u32>>,
    }

    impl Lifecycle for Counts {
        fn start(&self) -> Result<(), LifecycleError> {
            self.started.set(self.started.get() + 1);
            Ok(())
        }

        fn dispose(&self) -> Result<(), LifecycleError> {
            self.disposed.set(self.disposed.get() + 1);
            Ok(())
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_only_distinct_values_are_delivered() {
        let notifier = Notifier::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = notifier
            .subscribe(Counts::default(), move |v| seen2.borrow_mut().push(*v))
            .unwrap();

        for v in [1, 1, 2, 2, 2, 3] {
            notifier.emit(v);
        }
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_structural_equality() {
        let profile = Profile {
            name: "a".into(),
            tags: vec!["x".into()],
        };
        let notifier = Notifier::new(profile.clone());
        assert!(!notifier.emit(profile.clone()));
        assert!(notifier.emit(Profile {
            tags: vec!["y".into()],
            ..profile
        }));
    }

    #[test]
    fn test_lifecycle_follows_observer_count() {
        let notifier = Notifier::new("x".to_string());
        let counts = Counts::default();

        let a = notifier.subscribe(counts.clone(), |_| {}).unwrap();
        let b = notifier.subscribe(counts.clone(), |_| {}).unwrap();
        assert_eq!(counts.started.get(), 1);

        a.unsubscribe().unwrap();
        assert_eq!(counts.disposed.get(), 0);
        drop(b);
        assert_eq!(counts.disposed.get(), 1);

        let c = notifier.subscribe(counts.clone(), |_| {}).unwrap();
        assert_eq!(counts.started.get(), 2);
        drop(c);
        assert_eq!(counts.disposed.get(), 2);
    }

    #[test]
    fn test_start_runs_before_replay() {
        let notifier = Notifier::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Recorder(Rc<RefCell<Vec<&'static str>>>);
        impl Lifecycle for Recorder {
            fn start(&self) -> Result<(), LifecycleError> {
                self.0.borrow_mut().push("start");
                Ok(())
            }
            fn dispose(&self) -> Result<(), LifecycleError> {
                Ok(())
            }
        }

        let o = order.clone();
        let _sub = notifier
            .subscribe(Recorder(order.clone()), move |_| o.borrow_mut().push("value"))
            .unwrap();
        assert_eq!(*order.borrow(), vec!["start", "value"]);
    }

    #[test]
    fn test_distinct_gate() {
        let gate = Distinct::new();
        assert!(gate.admit(&1));
        assert!(!gate.admit(&1));
        assert!(gate.admit(&2));
        assert!(gate.admit(&1));
    }
}
