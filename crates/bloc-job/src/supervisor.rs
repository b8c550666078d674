use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

use crate::job::{Job, JobHandle, JobTask};

new_key_type! {
    struct ChildKey;
}

#[derive(Default)]
struct SupervisorState {
    children: RefCell<SlotMap<ChildKey, JobHandle>>,
    scopes: RefCell<Vec<Weak<SupervisorState>>>,
}

/// Owns any number of child jobs and cancels them together.
///
/// A failing child never affects its siblings or the supervisor. Finished
/// children unregister themselves.
#[derive(Clone, Default)]
pub struct SupervisorJob {
    state: Rc<SupervisorState>,
}

impl SupervisorJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `body` as a child job onto the current `LocalSet`.
    pub fn launch<T, E, F, Fut>(&self, body: F) -> JobTask<T, E>
    where
        T: 'static,
        E: 'static,
        F: FnOnce(JobHandle) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let job = Job::new(body);
        let key = self.state.children.borrow_mut().insert(job.handle());
        let state = Rc::downgrade(&self.state);
        job.run_with(move |_| {
            if let Some(state) = state.upgrade() {
                state.children.borrow_mut().remove(key);
            }
        })
    }

    /// A nested supervisor whose children are cancelled along with this one's.
    ///
    /// The parent only holds it weakly: dropping every clone of the nested
    /// scope cancels its children and unregisters it.
    pub fn child(&self) -> SupervisorJob {
        let child = SupervisorJob::new();
        let mut scopes = self.state.scopes.borrow_mut();
        scopes.retain(|scope| scope.strong_count() > 0);
        scopes.push(Rc::downgrade(&child.state));
        child
    }

    /// Live nested scopes. Dead entries are pruned on the way.
    fn scopes(&self) -> Vec<SupervisorJob> {
        let mut scopes = self.state.scopes.borrow_mut();
        scopes.retain(|scope| scope.strong_count() > 0);
        scopes
            .iter()
            .filter_map(Weak::upgrade)
            .map(|state| SupervisorJob { state })
            .collect()
    }

    /// Requests cancellation of every running child, nested supervisors
    /// included. Returns how many jobs were signalled.
    pub fn cancel_children(&self) -> usize {
        let children: Vec<JobHandle> = {
            let mut map = self.state.children.borrow_mut();
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &children {
            handle.cancel();
        }

        let nested: usize = self
            .scopes()
            .iter()
            .map(SupervisorJob::cancel_children)
            .sum();

        if !children.is_empty() {
            log::trace!("supervisor cancelled {} child job(s)", children.len());
        }
        children.len() + nested
    }

    pub fn active_children(&self) -> usize {
        let own = self.state.children.borrow().len();
        let nested: usize = self
            .scopes()
            .iter()
            .map(SupervisorJob::active_children)
            .sum();
        own + nested
    }
}

impl Drop for SupervisorState {
    fn drop(&mut self) {
        for (_, handle) in self.children.get_mut().drain() {
            handle.cancel();
        }
    }
}
