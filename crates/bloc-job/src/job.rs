use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{JobCancelled, JobError, Outcome};

pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

type Body<T, E> = Box<dyn FnOnce(JobHandle) -> LocalBoxFuture<'static, Result<T, E>>>;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

struct JobState {
    id: JobId,
    cancelled: Cell<bool>,
    completed: Cell<bool>,
    notify: Notify,
}

/// Cancellation handle and suspension helpers handed to a job's body.
///
/// Cloning is cheap; every clone observes and controls the same job.
#[derive(Clone)]
pub struct JobHandle {
    state: Rc<JobState>,
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.state.id)
            .field("cancelled", &self.state.cancelled.get())
            .field("completed", &self.state.completed.get())
            .finish()
    }
}

impl JobHandle {
    pub fn new() -> Self {
        Self {
            state: Rc::new(JobState {
                id: JobId::next(),
                cancelled: Cell::new(false),
                completed: Cell::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.state.id
    }

    /// Requests cancellation. Never blocks; the body stops at its next
    /// suspension point. No-op once the job has completed.
    pub fn cancel(&self) {
        if self.state.completed.get() || self.state.cancelled.replace(true) {
            return;
        }
        log::trace!("{} cancellation requested", self.state.id);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed.get()
    }

    pub fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.is_completed()
    }

    pub fn ptr_eq(&self, other: &JobHandle) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel() is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub async fn delay(&self, duration: Duration) -> Result<(), JobCancelled> {
        self.pause(tokio::time::sleep(duration)).await
    }

    /// Suspends until `fut` settles or the job is cancelled, whichever comes first.
    pub async fn pause<F: Future>(&self, fut: F) -> Result<F::Output, JobCancelled> {
        if self.is_cancelled() {
            return Err(JobCancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(JobCancelled),
            out = fut => Ok(out),
        }
    }

    fn complete(&self) {
        self.state.completed.set(true);
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of asynchronous work that can be cooperatively cancelled.
///
/// The body is not invoked until the job is run, so a job created and
/// cancelled before running never executes any of its code.
pub struct Job<T, E> {
    handle: JobHandle,
    body: Body<T, E>,
}

impl<T: 'static, E: 'static> Job<T, E> {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(JobHandle) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self::with_handle(JobHandle::new(), body)
    }

    pub fn with_handle<F, Fut>(handle: JobHandle, body: F) -> Self
    where
        F: FnOnce(JobHandle) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self {
            handle,
            body: Box::new(move |h| Box::pin(body(h))),
        }
    }

    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Runs the body in the caller's task, racing it against cancellation.
    pub async fn execute(self) -> Outcome<T, E> {
        let Job { handle, body } = self;
        if handle.is_cancelled() {
            handle.complete();
            return Err(JobError::Cancelled(JobCancelled));
        }

        let fut = body(handle.clone());
        let result = tokio::select! {
            biased;
            _ = handle.cancelled() => None,
            out = fut => Some(out),
        };
        handle.complete();

        match result {
            // A body that finished after cancellation was requested still reports it.
            Some(_) if handle.is_cancelled() => Err(JobError::Cancelled(JobCancelled)),
            Some(out) => out.map_err(JobError::Failed),
            None => Err(JobError::Cancelled(JobCancelled)),
        }
    }

    /// Spawns the job onto the current `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `tokio::task::LocalSet` context.
    pub fn run(self) -> JobTask<T, E> {
        let handle = self.handle();
        let join = tokio::task::spawn_local(self.execute());
        JobTask { handle, join }
    }

    /// Like [`Job::run`], invoking `on_done` exactly once with the outcome
    /// before it is handed to whoever awaits the task.
    pub fn run_with(self, on_done: impl FnOnce(&Outcome<T, E>) + 'static) -> JobTask<T, E> {
        let handle = self.handle();
        let join = tokio::task::spawn_local(async move {
            let outcome = self.execute().await;
            on_done(&outcome);
            outcome
        });
        JobTask { handle, join }
    }

    pub fn is_cancelled(outcome: &Outcome<T, E>) -> bool {
        matches!(outcome, Err(e) if e.is_cancelled())
    }
}

/// A spawned job. Awaiting it yields the job's outcome.
///
/// Dropping a `JobTask` detaches it; the job keeps running.
pub struct JobTask<T, E> {
    handle: JobHandle,
    join: JoinHandle<Outcome<T, E>>,
}

impl<T, E> JobTask<T, E> {
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl<T, E> fmt::Debug for JobTask<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTask").field("handle", &self.handle).finish()
    }
}

impl<T, E> Future for JobTask<T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.join).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            // The runtime dropped the task (shutdown); report it as a cancellation.
            Poll::Ready(Err(_)) => Poll::Ready(Err(JobError::Cancelled(JobCancelled))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run_local;
    use std::cell::RefCell;

    #[test]
    fn test_job_success() {
        run_local(async {
            let job: Job<u32, ()> = Job::new(|job| async move {
                if job.delay(Duration::from_millis(500)).await.is_err() {
                    return Err(());
                }
                Ok(7)
            });
            let handle = job.handle();
            let outcome = job.run().await;
            assert_eq!(outcome.ok(), Some(7));
            assert!(handle.is_completed());
            assert!(!handle.is_cancelled());
        });
    }

    #[test]
    fn test_job_failure_is_not_cancellation() {
        run_local(async {
            let job: Job<(), &'static str> = Job::new(|_| async { Err("boom") });
            let outcome = job.run().await;
            let err = outcome.unwrap_err();
            assert!(!err.is_cancelled());
            assert_eq!(err.failure(), Some(&"boom"));
        });
    }

    #[test]
    fn test_cancel_stops_at_suspension_point() {
        run_local(async {
            let reached = Rc::new(Cell::new(false));
            let reached2 = reached.clone();
            let task = Job::<(), ()>::new(move |job| async move {
                let _ = job.delay(Duration::from_millis(1000)).await;
                reached2.set(true);
                Ok(())
            })
            .run();

            tokio::time::sleep(Duration::from_millis(16)).await;
            task.cancel();
            let outcome = task.await;
            assert!(Job::is_cancelled(&outcome));

            tokio::time::sleep(Duration::from_millis(2000)).await;
            assert!(!reached.get());
        });
    }

    #[test]
    fn test_cancel_before_start_never_runs_body() {
        run_local(async {
            let ran = Rc::new(Cell::new(false));
            let ran2 = ran.clone();
            let job = Job::<(), ()>::new(move |_| async move {
                ran2.set(true);
                Ok(())
            });
            job.cancel();
            let outcome = job.run().await;
            assert!(outcome.unwrap_err().is_cancelled());
            assert!(!ran.get());
        });
    }

    #[test]
    fn test_code_between_suspension_points_completes() {
        run_local(async {
            let log = Rc::new(RefCell::new(Vec::new()));
            let log2 = log.clone();
            let task = Job::<(), ()>::new(move |job| async move {
                log2.borrow_mut().push("before");
                job.cancel();
                // Not a suspension point: runs even though cancellation was requested.
                log2.borrow_mut().push("after");
                if job.delay(Duration::from_millis(10)).await.is_err() {
                    return Err(());
                }
                log2.borrow_mut().push("unreachable");
                Ok(())
            })
            .run();
            assert!(task.await.unwrap_err().is_cancelled());
            assert_eq!(*log.borrow(), vec!["before", "after"]);
        });
    }

    #[test]
    fn test_pause_settles_first() {
        run_local(async {
            let handle = JobHandle::new();
            let v = handle.pause(async { 5 }).await;
            assert_eq!(v, Ok(5));

            let h2 = handle.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                h2.cancel();
            });
            let r = handle
                .pause(tokio::time::sleep(Duration::from_millis(100)))
                .await;
            assert_eq!(r, Err(JobCancelled));
        });
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        run_local(async {
            let job = Job::<u8, ()>::new(|_| async { Ok(1) });
            let handle = job.handle();
            assert_eq!(job.run().await.ok(), Some(1));
            handle.cancel();
            assert!(!handle.is_cancelled());
        });
    }
}
