/// Built-in hook implementations.
///
/// Bundled hooks the shell can enable from settings. Each hook is a concrete
/// struct that implements the `Hook` trait.
use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use crate::registry::Hook;
use crate::types::HookPayload;

// ---------------------------------------------------------------------------
// Logging hook: logs every lifecycle phase
// ---------------------------------------------------------------------------

pub struct LoggingHook {
    pub prefix: String,
}

impl LoggingHook {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging_hook"
    }

    async fn run(&self, payload: &HookPayload) -> Result<()> {
        let invocation = payload.invocation();
        info!(
            command_id = %invocation.command_id,
            command = %invocation.name,
            "[{}] Hook fired: {}",
            self.prefix,
            payload.phase()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deny-list hook: refuses to start blocked executables
// ---------------------------------------------------------------------------

pub struct DenyListHook {
    pub blocked: Vec<String>,
}

impl DenyListHook {
    pub fn new(blocked: Vec<String>) -> Self {
        Self { blocked }
    }
}

#[async_trait]
impl Hook for DenyListHook {
    fn name(&self) -> &str {
        "deny_list_hook"
    }

    async fn run(&self, payload: &HookPayload) -> Result<()> {
        let HookPayload::PreExecute { invocation } = payload else {
            return Ok(());
        };
        let program = std::path::Path::new(&invocation.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&invocation.name);
        if self.blocked.iter().any(|b| b == program) {
            bail!("command '{}' is blocked by settings", program);
        }
        Ok(())
    }
}
