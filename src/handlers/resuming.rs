//! `ResumingHandler` (spec §4.5). Owns both `RESUMING` and
//! `RESUMING_REVERTING`; which branch applies is decided by `ctx.status`.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::error;

use crate::policy::evaluate_failed_step;
use crate::types::{PlannedStep, SagaContext, SagaError, SagaStatus, StepLog, StepResult, StepStatus};

use super::{persist, HandlerDeps, HandlerRegistry, StateHandler};

pub struct ResumingHandler;

impl ResumingHandler {
    fn resolve<'a>(
        &'a self,
        ctx: &'a mut SagaContext,
        deps: &'a HandlerDeps,
        registry: &'a HandlerRegistry,
        is_forward: bool,
        planned: PlannedStep,
        result: StepResult,
        already_retried: bool,
    ) -> BoxFuture<'a, Result<(), SagaError>> {
        async move {
            let mut log = StepLog::started(planned.step_id.clone(), planned.action.clone(), 1, !is_forward);
            log.apply_result(&result);
            ctx.append_step_log(log);
            ctx.set_last_result(result.clone());

            match result.status {
                StepStatus::Succeeded | StepStatus::Completed => {
                    if is_forward {
                        let was_last = ctx.is_last_step();
                        ctx.mark_step_processed(planned.step_id.clone());
                        ctx.transition_to(if was_last { SagaStatus::Success } else { SagaStatus::Processing })?;
                    } else {
                        ctx.next_compensation_step();
                        let done = ctx.compensation_queue.is_empty();
                        ctx.transition_to(if done { SagaStatus::Reverted } else { SagaStatus::Reverting })?;
                    }
                    persist(ctx, deps).await;
                    registry.dispatch(ctx, deps).await
                }
                StepStatus::Failed | StepStatus::Rejected => {
                    if is_forward {
                        let next = evaluate_failed_step(ctx, &deps.config);
                        ctx.transition_to(next)?;
                        if next == SagaStatus::Reverting {
                            ctx.build_compensation_steps();
                        }
                    } else {
                        ctx.transition_to(SagaStatus::RevertFailed)?;
                    }
                    persist(ctx, deps).await;
                    registry.dispatch(ctx, deps).await
                }
                StepStatus::Pending => {
                    ctx.transition_to(if is_forward {
                        SagaStatus::Pending
                    } else {
                        SagaStatus::RevertingPending
                    })?;
                    persist(ctx, deps).await;
                    Ok(())
                }
                StepStatus::Unknown if !already_retried => {
                    let Some(step_impl) = deps.steps.get(&planned.action) else {
                        ctx.transition_to(SagaStatus::SystemError)?;
                        persist(ctx, deps).await;
                        return Ok(());
                    };
                    let retried = step_impl.execute(ctx, &planned.step_id).await;
                    self.resolve(ctx, deps, registry, is_forward, planned, retried, true).await
                }
                _ => {
                    error!(order_id = %ctx.order_id, status = %result.status, "unexpected step outcome while resuming");
                    ctx.transition_to(SagaStatus::SystemError)?;
                    persist(ctx, deps).await;
                    Ok(())
                }
            }
        }
        .boxed()
    }
}

#[async_trait]
impl StateHandler for ResumingHandler {
    fn owned_statuses(&self) -> &'static [SagaStatus] {
        &[SagaStatus::Resuming, SagaStatus::ResumingReverting]
    }

    async fn handle(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        registry: &HandlerRegistry,
    ) -> Result<(), SagaError> {
        let is_forward = ctx.status == SagaStatus::Resuming;

        let planned = if is_forward {
            ctx.next_forward_step().cloned()
        } else {
            ctx.compensation_queue.first().cloned()
        };

        // No step left to resume: in this model that coincides exactly with
        // the plan/compensation-queue already being exhausted, so the saga
        // is simply done. Spec §4.5 also allows `MANUAL_REVIEW` for a
        // corrupted cursor pointing at a missing step record; that case
        // can't arise here since `next_forward_step`/the compensation queue
        // are the sole source of truth for "current step".
        let Some(planned) = planned else {
            ctx.transition_to(if is_forward { SagaStatus::Success } else { SagaStatus::Reverted })?;
            persist(ctx, deps).await;
            return registry.dispatch(ctx, deps).await;
        };

        let Some(step_impl) = deps.steps.get(&planned.action) else {
            error!(order_id = %ctx.order_id, action = %planned.action, "no step implementation registered");
            ctx.transition_to(SagaStatus::SystemError)?;
            persist(ctx, deps).await;
            return Ok(());
        };

        let query = step_impl.query(ctx, &planned.step_id).await;
        self.resolve(ctx, deps, registry, is_forward, planned, query, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::handlers::{terminal::TerminalHandler, StepLookup};
    use crate::hooks::PassthroughHookChain;
    use crate::persistence::{InMemoryPersistence, PersistencePort};
    use crate::types::{CustomerId, ErrorCode, OrderId, OrderNo, SagaStep, StepId};
    use std::sync::Arc;

    struct QueryStep {
        action: &'static str,
        query_result: StepResult,
    }

    #[async_trait]
    impl SagaStep for QueryStep {
        fn action(&self) -> &str {
            self.action
        }
        fn service_type(&self) -> &str {
            "test"
        }
        fn is_compensatable(&self) -> bool {
            true
        }
        async fn execute(&self, _ctx: &SagaContext, _step_id: &StepId) -> StepResult {
            StepResult::succeeded(None)
        }
        async fn query(&self, _ctx: &SagaContext, _step_id: &StepId) -> StepResult {
            self.query_result.clone()
        }
    }

    fn ctx_resuming() -> SagaContext {
        let order = OrderId::new();
        let plan = vec![crate::types::PlannedStep {
            step_id: StepId::new(order, 0, "RESERVE_INVENTORY", "inventory"),
            action: "RESERVE_INVENTORY".into(),
            service_type: "inventory".into(),
            compensatable: true,
        }];
        let mut ctx = SagaContext::new(order, OrderNo::from("ORD-1"), CustomerId::from("c"), plan, chrono::Duration::minutes(30));
        ctx.status = SagaStatus::Resuming;
        ctx
    }

    fn deps_with(step: QueryStep) -> HandlerDeps {
        let mut lookup = StepLookup::new();
        lookup.register(Arc::new(step));
        HandlerDeps {
            persistence: Arc::new(InMemoryPersistence::new()),
            hooks: Arc::new(PassthroughHookChain),
            steps: Arc::new(lookup),
            config: Arc::new(EngineConfig::default()),
        }
    }

    #[tokio::test]
    async fn query_succeeded_on_last_step_reaches_success() {
        let mut ctx = ctx_resuming();
        let d = deps_with(QueryStep { action: "RESERVE_INVENTORY", query_result: StepResult::succeeded(None) });
        d.persistence.create(&ctx).await.unwrap();
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(ResumingHandler));
        registry.register(Arc::new(TerminalHandler));
        registry.dispatch(&mut ctx, &d).await.unwrap();
        assert_eq!(ctx.status, SagaStatus::Success);
    }

    #[tokio::test]
    async fn query_unknown_triggers_one_re_execute_then_resolves() {
        let mut ctx = ctx_resuming();
        let d = deps_with(QueryStep {
            action: "RESERVE_INVENTORY",
            query_result: StepResult::unknown(ErrorCode::UpstreamUnavailable, "in doubt"),
        });
        d.persistence.create(&ctx).await.unwrap();
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(ResumingHandler));
        registry.register(Arc::new(TerminalHandler));
        registry.dispatch(&mut ctx, &d).await.unwrap();
        // execute() on the stub always succeeds, so the re-execute resolves forward.
        assert_eq!(ctx.status, SagaStatus::Success);
    }

    #[tokio::test]
    async fn query_pending_parks_again() {
        let mut ctx = ctx_resuming();
        let d = deps_with(QueryStep { action: "RESERVE_INVENTORY", query_result: StepResult::processing() });
        d.persistence.create(&ctx).await.unwrap();
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(ResumingHandler));
        registry.dispatch(&mut ctx, &d).await.unwrap();
        assert_eq!(ctx.status, SagaStatus::Pending);
    }
}
