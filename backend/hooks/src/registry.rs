/// Hook trait and registry.
///
/// Hooks are async functions that observe a command invocation. Multiple
/// hooks can be registered per phase; they run sequentially in registration
/// order. The first hook to return an error halts the chain and the error is
/// handed back to the caller.
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{HookPayload, HookPhase};

// ---------------------------------------------------------------------------
// Hook trait
// ---------------------------------------------------------------------------

/// A hook that runs at a specific lifecycle phase.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn run(&self, payload: &HookPayload) -> Result<()>;
}

/// Adapts a synchronous closure into a [`Hook`].
pub struct FnHook<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&HookPayload) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, payload: &HookPayload) -> Result<()> {
        (self.f)(payload)
    }
}

pub fn hook_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Hook>
where
    F: Fn(&HookPayload) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHook {
        name: name.into(),
        f,
    })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type HookBox = Arc<dyn Hook>;
type PhaseMap = HashMap<HookPhase, Vec<HookBox>>;

/// Thread-safe registry of hooks organized by phase.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: Arc<RwLock<PhaseMap>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook to run at a specific phase.
    pub async fn register(&self, phase: HookPhase, hook: Arc<dyn Hook>) {
        debug!("[Hooks] Registered {} for phase {}", hook.name(), phase);
        let mut map = self.hooks.write().await;
        map.entry(phase).or_default().push(hook);
    }

    pub async fn count(&self, phase: HookPhase) -> usize {
        self.hooks.read().await.get(&phase).map_or(0, Vec::len)
    }

    /// Run all hooks registered for the payload's phase.
    pub async fn run(&self, payload: &HookPayload) -> Result<()> {
        let phase = payload.phase();
        // Snapshot so a hook may register further hooks without deadlocking.
        let chain: Vec<HookBox> = match self.hooks.read().await.get(&phase) {
            Some(chain) => chain.clone(),
            None => return Ok(()),
        };

        for hook in chain {
            debug!("[Hooks] Running {} for phase {}", hook.name(), phase);
            hook.run(payload)
                .await
                .with_context(|| format!("{} hook '{}' failed", phase, hook.name()))?;
        }
        Ok(())
    }
}
