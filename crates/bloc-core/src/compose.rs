//! Derived views over several containers.
//!
//! A [`Coordinator`] and a [`ViewModel`] both merge the states of a
//! [`SourceSet`] through a pure `transform`. Neither owns state, effects or
//! hooks of its own.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::LifecycleError;
use crate::notifier::Distinct;
use crate::observable::Subscription;
use crate::source::{Source, SourceSet, State, release_all};

type Transform<S, R> = fn(&<S as SourceSet>::States) -> R;
type React<R> = Rc<dyn Fn(&R)>;

/// Subscribes to every source and forwards each distinct merged value to
/// `observer`, after `react` if present.
fn merge<S: SourceSet, R: State>(
    sources: &S,
    transform: Transform<S, R>,
    react: Option<React<R>>,
    observer: impl Fn(&R) + 'static,
) -> Result<Subscription, LifecycleError> {
    let gate = Distinct::new();
    // Emissions caused by the sources starting are folded into the first
    // merged value below.
    let ready = Rc::new(Cell::new(false));
    let states = sources.clone();
    let on_change: Rc<dyn Fn()> = {
        let ready = ready.clone();
        Rc::new(move || {
            if !ready.get() {
                return;
            }
            let merged = transform(&states.states());
            if !gate.admit(&merged) {
                return;
            }
            if let Some(react) = &react {
                react(&merged);
            }
            observer(&merged);
        })
    };

    let links = sources.subscribe_all(on_change.clone(), true)?;
    ready.set(true);
    on_change();
    Ok(Subscription::new(move || release_all(links)))
}

/// Merges several containers into one value and takes part in their
/// lifecycles.
///
/// Each subscription to a coordinator subscribes to every source, so the
/// sources stay started as long as anyone observes the coordinator. The
/// optional `react` hook runs on every distinct merged value a subscription
/// delivers, before the observer.
pub struct Coordinator<S: SourceSet, R: State> {
    sources: S,
    transform: Transform<S, R>,
    react: Option<React<R>>,
}

impl<S: SourceSet, R: State> Clone for Coordinator<S, R> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            transform: self.transform,
            react: self.react.clone(),
        }
    }
}

impl<S: SourceSet, R: State> fmt::Debug for Coordinator<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("sources", &S::LEN)
            .field("state", &self.state())
            .finish()
    }
}

impl<S: SourceSet, R: State> Coordinator<S, R> {
    pub fn new(sources: S, transform: fn(&S::States) -> R) -> Self {
        Self {
            sources,
            transform,
            react: None,
        }
    }

    pub fn react(mut self, react: impl Fn(&R) + 'static) -> Self {
        self.react = Some(Rc::new(react));
        self
    }

    pub fn sources(&self) -> &S {
        &self.sources
    }

    /// Merged value of the sources' current states.
    pub fn state(&self) -> R {
        (self.transform)(&self.sources.states())
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&R) + 'static,
    ) -> Result<Subscription, LifecycleError> {
        merge(&self.sources, self.transform, self.react.clone(), observer)
    }
}

impl<S: SourceSet, R: State> Source for Coordinator<S, R> {
    type State = R;

    fn state(&self) -> R {
        Coordinator::state(self)
    }

    fn subscribe<F>(&self, observer: F) -> Result<Subscription, LifecycleError>
    where
        F: Fn(&R) + 'static,
    {
        Coordinator::subscribe(self, observer)
    }
}

/// Read-only facade merging several containers, without hooks.
///
/// It never keeps the sources started on its own: [`ViewModel::state`] reads
/// them on demand, and only an explicit [`ViewModel::subscribe`] counts as an
/// observer of each source for the subscription's lifetime.
pub struct ViewModel<S: SourceSet, R: State> {
    sources: S,
    transform: Transform<S, R>,
}

impl<S: SourceSet, R: State> Clone for ViewModel<S, R> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            transform: self.transform,
        }
    }
}

impl<S: SourceSet, R: State> fmt::Debug for ViewModel<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("sources", &S::LEN)
            .field("state", &self.state())
            .finish()
    }
}

impl<S: SourceSet, R: State> ViewModel<S, R> {
    pub fn new(sources: S, transform: fn(&S::States) -> R) -> Self {
        Self { sources, transform }
    }

    pub fn sources(&self) -> &S {
        &self.sources
    }

    pub fn state(&self) -> R {
        (self.transform)(&self.sources.states())
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&R) + 'static,
    ) -> Result<Subscription, LifecycleError> {
        merge(&self.sources, self.transform, None, observer)
    }
}

impl<S: SourceSet, R: State> Source for ViewModel<S, R> {
    type State = R;

    fn state(&self) -> R {
        ViewModel::state(self)
    }

    fn subscribe<F>(&self, observer: F) -> Result<Subscription, LifecycleError>
    where
        F: Fn(&R) + 'static,
    {
        ViewModel::subscribe(self, observer)
    }
}
