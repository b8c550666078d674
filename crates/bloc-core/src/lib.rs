//! # Blocs, Interactors and Coordinators
//!
//! Small single-threaded state containers. Each one holds an immutable
//! snapshot of state and hands it out through two surfaces: a synchronous
//! `state()` read, and `subscribe()`, which replays the current value and then
//! delivers every *distinct* change.
//!
//! - [`Bloc<T>`] owns its state. It changes only through `update`, runs keyed
//!   cancellable effects and resets to its initial state when the last
//!   observer leaves (unless told to persist).
//! - [`Interactor<T, D>`] derives part of its state from a fixed tuple of
//!   dependencies through a pure `computed` projection.
//! - [`Coordinator`] and [`ViewModel`] merge several containers into one
//!   value without owning anything.
//!
//! ## Updating and observing
//!
//! ```rust
//! use bloc_core::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! let counter = Bloc::new(Counter { count: 0 });
//! for _ in 0..3 {
//!     counter.update(|s| Counter { count: s.count + 1 });
//! }
//!
//! let sub = counter
//!     .subscribe(|s| println!("count = {}", s.count)) // prints "count = 3" right away
//!     .unwrap();
//! drop(sub); // last observer gone: the bloc is disposed and reset
//! assert_eq!(counter.state().count, 0);
//! ```
//!
//! ## Lifecycle
//!
//! A container is *started* when its observer count goes from 0 to 1 and
//! *disposed* when it drops back to 0, as many times as that happens. Disposal
//! cancels effects registered with `cancel_on_dispose` (the default) and every
//! job launched in the container's [`scope`](Bloc::scope). `on_start` and
//! `on_dispose` hooks run after that bookkeeping; what happens when they fail is
//! chosen with [`HookErrorPolicy`].
//!
//! ## Effects
//!
//! Effects run on the current `tokio::task::LocalSet`. Starting an effect under
//! a key that is still running cancels the old one first:
//!
//! ```ignore
//! let fetch = |bloc: &Bloc<Counter>| {
//!     let b = bloc.clone();
//!     bloc.effect(Effect::new("fetch", move |job| async move {
//!         job.delay(Duration::from_millis(500)).await?;
//!         b.update(|s| Counter { count: s.count + 1 });
//!         Ok::<_, JobCancelled>(())
//!     }))
//! };
//! let first = fetch(&counter);
//! let second = fetch(&counter);
//! assert!(first.await.unwrap_err().is_cancelled());
//! second.await?;
//! ```
//!
//! ## Inspection
//!
//! Containers built with an [`Inspector`] report construction, updates,
//! lifecycle transitions and cancelled effects to it. Reporting is active in
//! debug builds and in builds with the `inspector` feature.

pub mod bloc;
pub mod compose;
pub mod effect;
pub mod error;
pub mod inspect;
pub mod interactor;
pub mod lifecycle;
pub mod notifier;
pub mod observable;
pub mod options;
pub mod prelude;
pub mod source;


pub use bloc::*;
pub use compose::*;
pub use effect::{Effect, EffectKey, EffectStatus};
pub use error::*;
pub use inspect::*;
pub use interactor::*;
pub use lifecycle::*;
pub use notifier::*;
pub use observable::*;
pub use options::*;
pub use source::*;

pub use bloc_job::{
    Job, JobCancelled, JobError, JobHandle, JobId, JobTask, Outcome, SupervisorJob,
};
