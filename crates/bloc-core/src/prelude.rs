pub use crate::bloc::Bloc;
pub use crate::compose::{Coordinator, ViewModel};
pub use crate::effect::{Effect, EffectKey, EffectStatus};
pub use crate::error::{HookError, LifecycleError};
pub use crate::inspect::{Inspector, InspectorEvent, SharedInspector};
pub use crate::interactor::Interactor;
pub use crate::lifecycle::{HookErrorPolicy, Status};
pub use crate::observable::Subscription;
pub use crate::options::{BlocOptions, InteractorOptions};
pub use crate::source::{Source, SourceSet, State};
pub use bloc_job::{JobCancelled, JobError, JobHandle, JobTask, Outcome};
