//! # Jobs
//!
//! Cooperatively cancellable units of asynchronous work for single-threaded
//! state containers.
//!
//! - [`Job`] wraps an async body that receives a [`JobHandle`]. Running it
//!   yields an [`Outcome`]: the body's own `Result`, or
//!   [`JobError::Cancelled`] if cancellation was requested before it finished.
//! - [`JobHandle`] exposes the suspension points (`delay`, `pause`) and
//!   `cancel()`. Cancellation is a request: the body is dropped at its next
//!   `.await`, code between suspension points always runs to completion.
//! - [`SupervisorJob`] owns many children and cancels them together.
//!
//! Jobs are `!Send` and are spawned with `tokio::task::spawn_local`, so they
//! must run inside a `tokio::task::LocalSet`.
//!
//! ```ignore
//! use bloc_job::*;
//! use std::time::Duration;
//!
//! let task = Job::new(|job| async move {
//!     job.delay(Duration::from_millis(500)).await?;
//!     Ok::<_, JobCancelled>(42)
//! })
//! .run();
//!
//! task.cancel();
//! assert!(task.await.unwrap_err().is_cancelled());
//! ```

pub mod error;
pub mod job;
pub mod supervisor;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::*;
pub use job::*;
pub use supervisor::*;
