//! `RevertingHandler` (spec §4.6). The compensation queue is built by
//! whichever handler decided to enter `REVERTING` (`ProcessingHandler`/
//! `ResumingHandler`, via `SagaContext::build_compensation_steps`, at "the
//! moment of transition into REVERTING" per the spec) — this handler only
//! drains it.

use async_trait::async_trait;
use tracing::error;

use crate::types::{SagaContext, SagaError, SagaStatus, StepLog, StepStatus};

use super::{persist, HandlerDeps, HandlerRegistry, StateHandler};

pub struct RevertingHandler;

#[async_trait]
impl StateHandler for RevertingHandler {
    fn owned_statuses(&self) -> &'static [SagaStatus] {
        &[SagaStatus::Reverting]
    }

    async fn handle(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        registry: &HandlerRegistry,
    ) -> Result<(), SagaError> {
        let Some(planned) = ctx.next_compensation_step() else {
            ctx.transition_to(SagaStatus::Reverted)?;
            persist(ctx, deps).await;
            return registry.dispatch(ctx, deps).await;
        };

        let Some(step_impl) = deps.steps.get(&planned.action) else {
            error!(order_id = %ctx.order_id, action = %planned.action, "no step implementation registered for compensation");
            ctx.transition_to(SagaStatus::SystemError)?;
            persist(ctx, deps).await;
            return Ok(());
        };

        let attempt =
            ctx.step_logs.iter().filter(|l| l.step_id == planned.step_id && l.is_compensation).count() as u32 + 1;
        let result = step_impl.compensate(ctx, &planned.step_id).await;

        let mut log = StepLog::started(planned.step_id.clone(), planned.action.clone(), attempt, true);
        log.apply_result(&result);
        ctx.append_step_log(log);
        ctx.set_last_result(result.clone());

        match result.status {
            StepStatus::Succeeded | StepStatus::Completed => {
                let next = if ctx.compensation_queue.is_empty() {
                    SagaStatus::Reverted
                } else {
                    SagaStatus::Reverting
                };
                ctx.transition_to(next)?;
                persist(ctx, deps).await;
                registry.dispatch(ctx, deps).await
            }
            StepStatus::Pending | StepStatus::Unknown => {
                ctx.transition_to(SagaStatus::RevertingPending)?;
                persist(ctx, deps).await;
                Ok(())
            }
            StepStatus::Failed | StepStatus::Rejected => {
                ctx.transition_to(SagaStatus::RevertFailed)?;
                persist(ctx, deps).await;
                registry.dispatch(ctx, deps).await
            }
            other => {
                error!(order_id = %ctx.order_id, status = %other, "unexpected compensation outcome");
                ctx.transition_to(SagaStatus::SystemError)?;
                persist(ctx, deps).await;
                Ok(())
            }
        }
    }
}
