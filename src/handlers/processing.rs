//! `ProcessingHandler` (spec §4.4).

use async_trait::async_trait;
use tracing::{error, info};

use crate::policy::evaluate_failed_step;
use crate::types::{SagaContext, SagaError, SagaStatus, StepLog, StepStatus};

use super::{persist, HandlerDeps, HandlerRegistry, StateHandler};

pub struct ProcessingHandler;

impl ProcessingHandler {
    async fn handle_failure(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        registry: &HandlerRegistry,
    ) -> Result<(), SagaError> {
        let next = evaluate_failed_step(ctx, &deps.config);
        ctx.transition_to(next)?;
        if next == SagaStatus::Reverting {
            ctx.build_compensation_steps();
        }
        persist(ctx, deps).await;
        registry.dispatch(ctx, deps).await
    }
}

#[async_trait]
impl StateHandler for ProcessingHandler {
    fn owned_statuses(&self) -> &'static [SagaStatus] {
        &[SagaStatus::Processing]
    }

    async fn handle(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        registry: &HandlerRegistry,
    ) -> Result<(), SagaError> {
        let Some(planned) = ctx.next_forward_step().cloned() else {
            error!(order_id = %ctx.order_id, "Processing entered with no next forward step");
            ctx.transition_to(SagaStatus::SystemError)?;
            persist(ctx, deps).await;
            return Ok(());
        };

        let Some(step_impl) = deps.steps.get(&planned.action) else {
            error!(order_id = %ctx.order_id, action = %planned.action, "no step implementation registered");
            ctx.transition_to(SagaStatus::SystemError)?;
            persist(ctx, deps).await;
            return Ok(());
        };

        let attempt =
            ctx.step_logs.iter().filter(|l| l.step_id == planned.step_id).count() as u32 + 1;
        let result = step_impl.execute(ctx, &planned.step_id).await;

        let mut log = StepLog::started(planned.step_id.clone(), planned.action.clone(), attempt, false);
        log.apply_result(&result);
        ctx.append_step_log(log);
        ctx.set_last_result(result.clone());

        match result.status {
            StepStatus::Succeeded => {
                let was_last = ctx.is_last_step();
                ctx.mark_step_processed(planned.step_id.clone());
                if was_last {
                    ctx.transition_to(SagaStatus::Success)?;
                } else {
                    info!(order_id = %ctx.order_id, step = %planned.action, "step succeeded, advancing");
                }
                persist(ctx, deps).await;
                registry.dispatch(ctx, deps).await
            }
            StepStatus::Completed => {
                // Idempotent re-entry: the step was already done; don't
                // advance further this attempt, but it still counts toward
                // processed_step_ids (SPEC_FULL.md Open Question 1).
                ctx.mark_step_processed(planned.step_id.clone());
                persist(ctx, deps).await;
                Ok(())
            }
            StepStatus::Pending | StepStatus::Unknown => {
                ctx.transition_to(SagaStatus::Pending)?;
                persist(ctx, deps).await;
                Ok(())
            }
            StepStatus::Timeout => self.handle_failure(ctx, deps, registry).await,
            StepStatus::Executing | StepStatus::Processing | StepStatus::Skipped => {
                // Unexpected from a call that has already returned; park it
                // rather than guess at an outcome.
                ctx.transition_to(SagaStatus::Pending)?;
                persist(ctx, deps).await;
                Ok(())
            }
            StepStatus::Failed | StepStatus::Rejected => {
                self.handle_failure(ctx, deps, registry).await
            }
            StepStatus::NeedsCompensation
            | StepStatus::Compensating
            | StepStatus::Compensated
            | StepStatus::CompensationFailed => {
                error!(order_id = %ctx.order_id, status = %result.status, "compensation-only step status during forward flow");
                ctx.transition_to(SagaStatus::SystemError)?;
                persist(ctx, deps).await;
                Ok(())
            }
        }
    }
}
