/// Hook pipeline.
///
/// The public API surface for firing hooks from the command pipeline:
/// 1. Invocation accepted → `hooks.pre_execute(...)` → continue or fail
/// 2. Command completed → `hooks.post_execute(...)`
/// 3. Command failed → `hooks.on_error(...)`
use anyhow::Result;
use tracing::debug;

use crate::registry::HookRegistry;
use crate::types::{HookPayload, InvocationPayload, OutcomePayload};

/// Wraps the registry with one method per phase.
#[derive(Clone, Default)]
pub struct HookPipeline {
    pub registry: HookRegistry,
}

impl HookPipeline {
    pub fn new(registry: HookRegistry) -> Self {
        Self { registry }
    }

    pub async fn pre_execute(&self, invocation: InvocationPayload) -> Result<()> {
        debug!("[Pipeline] pre_execute command={}", invocation.name);
        self.registry
            .run(&HookPayload::PreExecute { invocation })
            .await
    }

    pub async fn post_execute(
        &self,
        invocation: InvocationPayload,
        outcome: OutcomePayload,
    ) -> Result<()> {
        debug!(
            "[Pipeline] post_execute command={} status={}",
            invocation.name, outcome.status
        );
        self.registry
            .run(&HookPayload::PostExecute {
                invocation,
                outcome,
            })
            .await
    }

    pub async fn on_error(
        &self,
        invocation: InvocationPayload,
        outcome: OutcomePayload,
    ) -> Result<()> {
        debug!(
            "[Pipeline] on_error command={} error={:?}",
            invocation.name, outcome.error
        );
        self.registry
            .run(&HookPayload::OnError {
                invocation,
                outcome,
            })
            .await
    }
}
