//! Port for external inspection tools (devtools).
//!
//! Containers report construction, updates, lifecycle transitions and effect
//! cancellations to an injected [`Inspector`]. Reporting is compiled in for
//! debug builds, or for any build with the `inspector` feature.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::effect::EffectKey;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a container instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerId {
    id: u64,
    kind: &'static str,
    name: Arc<str>,
}

impl ContainerId {
    pub(crate) fn new(kind: &'static str, name: Option<String>) -> Self {
        let name: Arc<str> = match name {
            Some(name) => name.into(),
            None => kind.into(),
        };
        Self {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            name,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// "Bloc" or "Interactor".
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Created,
    Update,
    Start,
    Dispose,
    EffectCancelled(EffectKey),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Created => f.write_str("New"),
            Action::Update => f.write_str("Update"),
            Action::Start => f.write_str("Start"),
            Action::Dispose => f.write_str("Dispose"),
            Action::EffectCancelled(key) => write!(f, "Cancel effect {key}"),
        }
    }
}

pub struct InspectorEvent<'a> {
    pub container: &'a ContainerId,
    pub action: Action,
    pub state: &'a dyn fmt::Debug,
}

impl InspectorEvent<'_> {
    /// Devtools-style label, e.g. `"Counter - Update"`.
    pub fn label(&self) -> String {
        match self.action {
            Action::Created => format!("{} - New {}", self.container.name(), self.container.kind()),
            _ => format!("{} - {}", self.container.name(), self.action),
        }
    }
}

pub trait Inspector: Send + Sync {
    fn record(&self, event: &InspectorEvent<'_>);
}

pub type SharedInspector = Arc<dyn Inspector>;

pub(crate) fn report(
    inspector: Option<&SharedInspector>,
    container: &ContainerId,
    action: Action,
    state: &dyn fmt::Debug,
) {
    if !cfg!(any(debug_assertions, feature = "inspector")) {
        return;
    }
    if let Some(inspector) = inspector {
        inspector.record(&InspectorEvent {
            container,
            action,
            state,
        });
    }
}
