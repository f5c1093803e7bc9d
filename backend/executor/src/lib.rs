//! Command execution for shellforge.
//!
//! `CommandPipeline` runs a `CommandInvocation` through its lifecycle using
//! a local or remote `ExecutionStrategy`.

pub mod pipeline;
pub mod strategy;
pub mod types;

pub use pipeline::CommandPipeline;
pub use strategy::{
    cancel_pair, CancelHandle, CancelSignal, ExecutionStrategy, LocalExecutor, RemoteExecutor,
    REMOTE_NOT_IMPLEMENTED,
};
pub use types::{CommandInvocation, CommandResult, CommandStatus};
