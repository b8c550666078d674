use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::error::LifecycleError;

new_key_type! {
    pub struct ObserverKey;
}

type Observer<T> = Rc<dyn Fn(&T)>;

struct Entry<T> {
    observer: Observer<T>,
    /// Sequence number current when the observer joined; it has already seen that value.
    since: u64,
}

struct Inner<T> {
    value: T,
    seq: u64,
    observers: SlotMap<ObserverKey, Entry<T>>,
    pending: VecDeque<(u64, T)>,
    delivering: bool,
}

/// Multicast value cell that replays its current value to new observers.
///
/// Values set while a delivery is in progress (from inside an observer) are
/// queued and delivered afterwards, so every observer sees values in the
/// order `set` was called.
pub struct Subject<T>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Subject")
            .field("value", &inner.value)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

impl<T: Clone + 'static> Subject<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            value,
            seq: 0,
            observers: SlotMap::with_key(),
            pending: VecDeque::new(),
            delivering: false,
        })))
    }

    pub fn get(&self) -> T {
        self.0.borrow().value.clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow().value)
    }

    pub fn observer_count(&self) -> usize {
        self.0.borrow().observers.len()
    }

    pub fn set(&self, value: T) {
        {
            let mut inner = self.0.borrow_mut();
            inner.seq += 1;
            let seq = inner.seq;
            inner.value = value.clone();
            if inner.observers.is_empty() && !inner.delivering {
                return;
            }
            inner.pending.push_back((seq, value));
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }

        let _guard = DeliveryGuard(&self.0);
        loop {
            let (value, targets) = {
                let mut inner = self.0.borrow_mut();
                let Some((seq, value)) = inner.pending.pop_front() else {
                    break;
                };
                let targets: SmallVec<[(ObserverKey, Observer<T>); 4]> = inner
                    .observers
                    .iter()
                    .filter(|(_, e)| e.since < seq)
                    .map(|(k, e)| (k, e.observer.clone()))
                    .collect();
                (value, targets)
            };
            for (key, observer) in targets {
                // Skip observers removed by an earlier callback in this round.
                let live = self.0.borrow().observers.contains_key(key);
                if live {
                    observer(&value);
                }
            }
        }
    }

    /// Registers `observer` and immediately calls it with the current value.
    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> ObserverKey {
        let observer: Observer<T> = Rc::new(observer);
        let (key, value) = {
            let mut inner = self.0.borrow_mut();
            let since = inner.seq;
            let key = inner.observers.insert(Entry {
                observer: observer.clone(),
                since,
            });
            (key, inner.value.clone())
        };
        observer(&value);
        key
    }

    pub fn unsubscribe(&self, key: ObserverKey) -> bool {
        self.0.borrow_mut().observers.remove(key).is_some()
    }
}

struct DeliveryGuard<'a, T>(&'a RefCell<Inner<T>>);

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        let mut inner = self.0.borrow_mut();
        inner.delivering = false;
        if std::thread::panicking() {
            inner.pending.clear();
        }
    }
}

/// RAII guard for an observer registration. Dropping it unsubscribes.
///
/// Unsubscribing the last observer of a container disposes it; use
/// [`Subscription::unsubscribe`] to receive a failing `on_dispose` hook's
/// error instead of having it logged.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() -> Result<(), LifecycleError>>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() -> Result<(), LifecycleError> + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that owns nothing.
    pub fn empty() -> Self {
        Self { release: None }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn unsubscribe(mut self) -> Result<(), LifecycleError> {
        match self.release.take() {
            Some(release) => release(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take()
            && let Err(err) = release()
        {
            log::error!("error while dropping subscription: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_subject_replays_current_value() {
        let subject = Subject::new(1);
        subject.set(2);
        subject.set(3);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        subject.subscribe(move |v| seen2.borrow_mut().push(*v));
        assert_eq!(*seen.borrow(), vec![3]);

        subject.set(4);
        assert_eq!(*seen.borrow(), vec![3, 4]);
        assert_eq!(subject.get(), 4);
    }

    #[test]
    fn test_subject_unsubscribe() {
        let subject = Subject::new(0);
        let count = Rc::new(RefCell::new(0));
        let count2 = count.clone();
        let key = subject.subscribe(move |_| *count2.borrow_mut() += 1);
        assert_eq!(subject.observer_count(), 1);

        assert!(subject.unsubscribe(key));
        assert!(!subject.unsubscribe(key));
        subject.set(5);
        assert_eq!(*count.borrow(), 1);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_reentrant_set_is_delivered_in_order() {
        let subject = Subject::new(0);
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));

        let s = subject.clone();
        let f = first.clone();
        subject.subscribe(move |v| {
            f.borrow_mut().push(*v);
            if *v == 1 {
                s.set(2);
            }
        });
        let g = second.clone();
        subject.subscribe(move |v| g.borrow_mut().push(*v));

        subject.set(1);
        assert_eq!(*first.borrow(), vec![0, 1, 2]);
        assert_eq!(*second.borrow(), vec![0, 1, 2]);
        assert_eq!(subject.get(), 2);
    }

    #[test]
    fn test_observer_added_during_delivery_skips_older_values() {
        let subject = Subject::new(0);
        let late = Rc::new(RefCell::new(Vec::new()));

        let s = subject.clone();
        let l = late.clone();
        let added = Rc::new(RefCell::new(false));
        subject.subscribe(move |v| {
            if *v == 1 && !*added.borrow() {
                *added.borrow_mut() = true;
                let l = l.clone();
                s.subscribe(move |v| l.borrow_mut().push(*v));
            }
        });

        subject.set(1);
        subject.set(2);
        assert_eq!(*late.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_subscription_runs_release_once() {
        let released = Rc::new(RefCell::new(0));
        let r = released.clone();
        let sub = Subscription::new(move || {
            *r.borrow_mut() += 1;
            Ok(())
        });
        assert!(sub.is_active());
        sub.unsubscribe().unwrap();
        assert_eq!(*released.borrow(), 1);

        let r = released.clone();
        {
            let _sub = Subscription::new(move || {
                *r.borrow_mut() += 1;
                Ok(())
            });
        }
        assert_eq!(*released.borrow(), 2);
    }
}
