use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::LifecycleError;
use crate::observable::Subscription;

/// Values a container can hold: immutable snapshots compared structurally.
pub trait State: Clone + PartialEq + fmt::Debug + 'static {}
impl<T: Clone + PartialEq + fmt::Debug + 'static> State for T {}

/// Anything exposing a current state and a replaying, distinct stream of it.
///
/// This is the surface a UI binding layer consumes.
pub trait Source: Clone + 'static {
    type State: State;

    /// Current state, computed synchronously without side effects.
    fn state(&self) -> Self::State;

    /// Calls `observer` immediately with the current state, then with every
    /// distinct change until the returned [`Subscription`] is dropped.
    fn subscribe<F>(&self, observer: F) -> Result<Subscription, LifecycleError>
    where
        F: Fn(&Self::State) + 'static;
}

pub type Subscriptions = SmallVec<[Subscription; 4]>;

/// A fixed, ordered group of [`Source`]s (a tuple of them).
pub trait SourceSet: Clone + 'static {
    type States: State;

    const LEN: usize;

    fn states(&self) -> Self::States;

    /// Subscribes to every source, calling `on_change` on each emission.
    /// With `skip_replay`, each source's immediate replay is ignored.
    fn subscribe_all(
        &self,
        on_change: Rc<dyn Fn()>,
        skip_replay: bool,
    ) -> Result<Subscriptions, LifecycleError>;
}

fn watch<S: Source>(
    source: &S,
    on_change: Rc<dyn Fn()>,
    skip_replay: bool,
) -> Result<Subscription, LifecycleError> {
    let skipping = Cell::new(skip_replay);
    source.subscribe(move |_| {
        if skipping.replace(false) {
            return;
        }
        on_change();
    })
}

/// Releases every subscription, returning the first lifecycle error.
pub(crate) fn release_all(subs: Subscriptions) -> Result<(), LifecycleError> {
    let mut first = None;
    for sub in subs {
        if let Err(err) = sub.unsubscribe() {
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

macro_rules! one {
    ($idx:tt) => {
        1usize
    };
}

macro_rules! impl_source_set {
    ($($name:ident : $idx:tt),*) => {
        impl<$($name: Source),*> SourceSet for ($($name,)*) {
            type States = ($(<$name as Source>::State,)*);

            const LEN: usize = 0 $(+ one!($idx))*;

            fn states(&self) -> Self::States {
                ($(self.$idx.state(),)*)
            }

            #[allow(unused_mut, unused_variables)]
            fn subscribe_all(
                &self,
                on_change: Rc<dyn Fn()>,
                skip_replay: bool,
            ) -> Result<Subscriptions, LifecycleError> {
                let mut subs = Subscriptions::new();
                $(
                    subs.push(watch(&self.$idx, on_change.clone(), skip_replay)?);
                )*
                Ok(subs)
            }
        }
    };
}

impl_source_set!();
impl_source_set!(A: 0);
impl_source_set!(A: 0, B: 1);
impl_source_set!(A: 0, B: 1, C: 2);
impl_source_set!(A: 0, B: 1, C: 2, D: 3);
impl_source_set!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_source_set!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
