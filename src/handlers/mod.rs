//! State-handler registry (spec §4.8) and the shared collaborators every
//! handler is invoked with.

pub mod init;
pub mod processing;
pub mod resuming;
pub mod reverting;
pub mod terminal;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::config::EngineConfig;
use crate::hooks::HookChain;
use crate::persistence::PersistencePort;
use crate::types::{SagaContext, SagaError, SagaStatus, SagaStep};

/// Looks up a pluggable `SagaStep` implementation by its action name
/// (`"RESERVE_INVENTORY"`, ...). Built once at composition time.
#[derive(Default)]
pub struct StepLookup {
    steps: HashMap<String, Arc<dyn SagaStep>>,
}

impl StepLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step: Arc<dyn SagaStep>) {
        self.steps.insert(step.action().to_string(), step);
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn SagaStep>> {
        self.steps.get(action).cloned()
    }
}

/// Collaborators every `StateHandler` needs. Cloned cheaply (everything is
/// an `Arc`) and passed down through every delegation in a dispatch chain.
#[derive(Clone)]
pub struct HandlerDeps {
    pub persistence: Arc<dyn PersistencePort>,
    pub hooks: Arc<dyn HookChain>,
    pub steps: Arc<StepLookup>,
    pub config: Arc<EngineConfig>,
}

/// One behavioral function per status group (spec §4.3–4.7). Handlers
/// never reference each other directly; the only way one delegates to
/// another is through the registry passed into `handle` (spec §9 "cyclic
/// references" design note).
#[async_trait]
pub trait StateHandler: Send + Sync {
    /// Statuses this handler declares ownership of.
    fn owned_statuses(&self) -> &'static [SagaStatus];

    /// Run this handler's logic against `ctx`, whose `status` is one of
    /// `owned_statuses()`. May mutate `ctx.status` and delegate onward via
    /// `registry.dispatch`.
    async fn handle(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        registry: &HandlerRegistry,
    ) -> Result<(), SagaError>;
}

/// `Status -> handler` map, built once at startup and read-only afterward
/// (spec §4.8, §9 "global mutable state").
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<SagaStatus, Arc<dyn StateHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every status it declares ownership of.
    pub fn register(&mut self, handler: Arc<dyn StateHandler>) {
        for status in handler.owned_statuses() {
            self.handlers.insert(*status, handler.clone());
        }
    }

    pub fn get(&self, status: SagaStatus) -> Result<Arc<dyn StateHandler>, SagaError> {
        self.handlers
            .get(&status)
            .cloned()
            .ok_or(SagaError::StateHandlerNotFound(status))
    }

    /// Look up the handler owning `ctx.status` and invoke it. Evaluates the
    /// universal `<any non-terminal> -> TIMEOUT` edge on entry (spec §4.2,
    /// §5) before consulting the registry, so a saga that outlived its
    /// budget is routed to `TerminalHandler` instead of whatever handler
    /// its stale status would otherwise own.
    pub async fn dispatch(&self, ctx: &mut SagaContext, deps: &HandlerDeps) -> Result<(), SagaError> {
        if !ctx.is_terminal() && ctx.is_timed_out() {
            warn!(order_id = %ctx.order_id, status = %ctx.status, "saga exceeded its timeout budget");
            ctx.transition_to(SagaStatus::Timeout)?;
            persist(ctx, deps).await;
        }
        let handler = self.get(ctx.status)?;
        handler.handle(ctx, deps, self).await
    }
}

/// Write `ctx`'s current status through the persistence port. Logs and
/// returns `false` on a lost optimistic-lock race or a backend error;
/// never panics (spec §4.4: "failure of that write is logged but the
/// in-memory status is returned — the recovery job reconciles").
pub async fn persist(ctx: &mut SagaContext, deps: &HandlerDeps) -> bool {
    match deps.persistence.update_status(ctx).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(order_id = %ctx.order_id, status = %ctx.status, "optimistic lock conflict persisting status");
            false
        }
        Err(e) => {
            error!(order_id = %ctx.order_id, status = %ctx.status, error = %e, "persistence failure writing status");
            false
        }
    }
}

/// Composition root: builds a registry with every handler wired in,
/// mirroring the teacher's explicit `register(registry)` convention rather
/// than reflection-based auto-registration (spec §9).
pub fn build_default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(init::InitHandler));
    registry.register(Arc::new(processing::ProcessingHandler));
    registry.register(Arc::new(resuming::ResumingHandler));
    registry.register(Arc::new(reverting::RevertingHandler));
    registry.register(Arc::new(terminal::TerminalHandler));
    registry
}
