//! `InitHandler` (spec §4.3).

use async_trait::async_trait;
use tracing::error;

use crate::hooks::{HookOutcome, HookRejectReason};
use crate::types::{ErrorCode, SagaContext, SagaError, SagaStatus, StepResult};

use super::{persist, HandlerDeps, HandlerRegistry, StateHandler};

pub struct InitHandler;

#[async_trait]
impl StateHandler for InitHandler {
    fn owned_statuses(&self) -> &'static [SagaStatus] {
        &[SagaStatus::Init]
    }

    async fn handle(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        registry: &HandlerRegistry,
    ) -> Result<(), SagaError> {
        let outcome = match deps.hooks.before_transition(ctx, SagaStatus::Processing).await {
            Ok(outcome) => outcome,
            Err(message) => HookOutcome::reject(HookRejectReason::SystemError, message),
        };

        match outcome {
            HookOutcome::Continue => {
                ctx.transition_to(SagaStatus::Processing)?;
                if !persist(ctx, deps).await {
                    // No step has executed yet; nothing to compensate.
                    ctx.transition_to(SagaStatus::SystemError)?;
                    persist(ctx, deps).await;
                    return Ok(());
                }
                registry.dispatch(ctx, deps).await
            }
            HookOutcome::Reject { reason, message } => {
                match reason {
                    HookRejectReason::Duplicate => {
                        ctx.set_last_result(StepResult::rejected(ErrorCode::DuplicateRequest, message));
                        ctx.transition_to(SagaStatus::Failed)?;
                    }
                    HookRejectReason::Validation => {
                        ctx.set_last_result(StepResult::rejected(ErrorCode::ValidationFailed, message));
                        ctx.transition_to(SagaStatus::Failed)?;
                    }
                    HookRejectReason::Authorization => {
                        ctx.set_last_result(StepResult::rejected(ErrorCode::AuthorizationDenied, message));
                        ctx.transition_to(SagaStatus::Failed)?;
                    }
                    HookRejectReason::SystemError => {
                        error!(order_id = %ctx.order_id, %message, "before-hook chain raised a system error");
                        ctx.transition_to(SagaStatus::SystemError)?;
                    }
                }
                persist(ctx, deps).await;
                Ok(())
            }
        }
    }
}
