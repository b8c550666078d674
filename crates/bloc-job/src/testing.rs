//! Helpers for driving jobs deterministically in tests.

use std::future::Future;

/// Runs `fut` to completion on a fresh current-thread runtime with a paused
/// clock, inside a `LocalSet` so jobs can be spawned.
///
/// Timers auto-advance whenever the runtime is otherwise idle, so a
/// `delay(500ms)` completes instantly in wall-clock time.
pub fn run_local<F: Future>(fut: F) -> F::Output {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime");
    tokio::task::LocalSet::new().block_on(&rt, fut)
}
