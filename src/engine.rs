//! Saga engine entry point (spec §4.9, §6.1) — `start`, `resume`, `query`, `exists`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::handlers::{HandlerDeps, HandlerRegistry};
use crate::types::{
    CustomerId, ErrorCode, OrderId, OrderNo, PersistenceError, PlannedStep, SagaContext, StepId, StepResult,
};

/// One entry of a command's forward plan, as supplied by the caller — the
/// engine has no knowledge of what an order's line items or payment method
/// look like, so this is the orchestration-level equivalent of spec §6.1's
/// `items[]`/`payment`/`shipping` fields.
#[derive(Debug, Clone)]
pub struct PlannedStepSpec {
    pub action: String,
    pub service_type: String,
    pub compensatable: bool,
}

#[derive(Debug, Clone)]
pub struct StartSagaCommand {
    pub order_no: OrderNo,
    pub customer_id: CustomerId,
    pub steps: Vec<PlannedStepSpec>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub timeout: Option<chrono::Duration>,
}

#[derive(Debug, Clone)]
pub struct ResumeSagaCommand {
    pub order_id: OrderId,
    pub step_id: Option<StepId>,
    pub callback_result: Option<StepResult>,
    pub is_recovery: bool,
    pub source: String,
}

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("saga {0} not found")]
    NotFound(OrderId),
}

/// `C9`: constructs contexts, dispatches to the handler registry, and loops
/// a saga call to quiescence (a terminal status or a parked wait).
pub struct SagaEngine {
    deps: HandlerDeps,
    registry: HandlerRegistry,
}

impl SagaEngine {
    pub fn new(deps: HandlerDeps, registry: HandlerRegistry) -> Self {
        Self { deps, registry }
    }

    pub async fn start(&self, cmd: StartSagaCommand) -> SagaContext {
        let order_id = OrderId::new();
        let plan: Vec<PlannedStep> = cmd
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, spec)| PlannedStep {
                step_id: StepId::new(order_id, index, &spec.action, &spec.service_type),
                action: spec.action,
                service_type: spec.service_type,
                compensatable: spec.compensatable,
            })
            .collect();

        let timeout = cmd.timeout.unwrap_or_else(|| self.deps.config.default_timeout());
        let mut ctx = SagaContext::new(order_id, cmd.order_no, cmd.customer_id, plan, timeout);
        ctx.metadata = cmd.metadata;

        match self.deps.persistence.create(&ctx).await {
            Ok(()) => {
                if let Err(e) = self.registry.dispatch(&mut ctx, &self.deps).await {
                    error!(order_id = %ctx.order_id, error = %e, "dispatch failed during start");
                }
                ctx
            }
            // A genuine duplicate is normally caught by a before-hook's
            // dedup check (§4.3); persistence-level duplicate rejection is
            // the backstop for a race between two concurrent `start`s with
            // the same order number (spec §8.4).
            Err(e @ (PersistenceError::DuplicateOrderNo(_) | PersistenceError::DuplicateOrderId(_))) => {
                warn!(order_id = %ctx.order_id, error = %e, "duplicate saga rejected at persistence boundary");
                ctx.set_last_result(StepResult::rejected(ErrorCode::DuplicateRequest, e.to_string()));
                let _ = ctx.transition_to(crate::types::SagaStatus::Failed);
                ctx
            }
            Err(e) => {
                error!(order_id = %ctx.order_id, error = %e, "persistence refused to create saga");
                let _ = ctx.transition_to(crate::types::SagaStatus::SystemError);
                ctx
            }
        }
    }

    pub async fn resume(&self, cmd: ResumeSagaCommand) -> Result<SagaContext, EngineError> {
        if !self.deps.persistence.try_lock(cmd.order_id).await.unwrap_or(false) {
            // Another resume/recovery is in flight; this one is a no-op and
            // simply observes whatever the lock holder leaves behind
            // (spec §5, §8.4).
            info!(order_id = %cmd.order_id, "resume skipped: saga already locked");
            return self
                .deps
                .persistence
                .get(cmd.order_id)
                .await
                .ok()
                .flatten()
                .ok_or(EngineError::NotFound(cmd.order_id));
        }

        let result = self.resume_locked(cmd.clone()).await;
        let _ = self.deps.persistence.release_lock(cmd.order_id).await;
        result
    }

    async fn resume_locked(&self, cmd: ResumeSagaCommand) -> Result<SagaContext, EngineError> {
        let Some(mut ctx) = self
            .deps
            .persistence
            .get(cmd.order_id)
            .await
            .ok()
            .flatten()
        else {
            return Err(EngineError::NotFound(cmd.order_id));
        };

        if ctx.is_terminal() {
            info!(order_id = %ctx.order_id, status = %ctx.status, "resume refused: saga already terminal");
            return Ok(ctx);
        }

        if let (Some(step_id), Some(callback)) = (cmd.step_id.as_ref(), cmd.callback_result.clone()) {
            if let Some(step_impl) = ctx
                .plan
                .iter()
                .find(|p| &p.step_id == step_id)
                .and_then(|p| self.deps.steps.get(&p.action))
            {
                let _ = step_impl.update_status(&ctx, step_id, callback.clone()).await;
            }
            ctx.set_last_result(callback);
        }

        if cmd.is_recovery {
            let classification = ctx.status.recovery_of();
            ctx.metadata
                .insert("recovery_classification".to_string(), serde_json::json!(classification.to_string()));
            ctx.metadata.insert("recovery_source".to_string(), serde_json::json!(cmd.source));
        }

        let next = ctx.status.resume_of();
        ctx.transition_to(next).map_err(|_| EngineError::NotFound(cmd.order_id))?;
        if !crate::handlers::persist(&mut ctx, &self.deps).await {
            warn!(order_id = %ctx.order_id, "persistence failure writing resumed status");
        }

        if let Err(e) = self.registry.dispatch(&mut ctx, &self.deps).await {
            error!(order_id = %ctx.order_id, error = %e, "dispatch failed during resume");
        }

        Ok(ctx)
    }

    pub async fn query(&self, order_id: OrderId) -> Option<SagaContext> {
        self.deps.persistence.get(order_id).await.ok().flatten()
    }

    pub async fn exists(&self, order_no: &OrderNo) -> bool {
        matches!(self.deps.persistence.get_by_order_no(order_no).await, Ok(Some(_)))
    }
}

/// Convenience constructor wiring the default handler registry (spec §4.8
/// composition root) with caller-supplied collaborators.
pub fn build_engine(
    persistence: Arc<dyn crate::persistence::PersistencePort>,
    hooks: Arc<dyn crate::hooks::HookChain>,
    steps: Arc<crate::handlers::StepLookup>,
    config: Arc<crate::config::EngineConfig>,
) -> SagaEngine {
    let deps = HandlerDeps { persistence, hooks, steps, config };
    SagaEngine::new(deps, crate::handlers::build_default_registry())
}
