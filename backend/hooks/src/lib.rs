pub mod builtin;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use builtin::{DenyListHook, LoggingHook};
pub use pipeline::HookPipeline;
pub use registry::{hook_fn, Hook, HookRegistry};
pub use types::{HookPayload, HookPhase, InvocationPayload, OutcomePayload};
