//! `TerminalHandler` (spec §4.7). Owns every terminal status; always the
//! last handler in a dispatch chain.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::{SagaContext, SagaError, SagaStatus};

use super::{HandlerDeps, HandlerRegistry, StateHandler};

pub struct TerminalHandler;

#[async_trait]
impl StateHandler for TerminalHandler {
    fn owned_statuses(&self) -> &'static [SagaStatus] {
        &[
            SagaStatus::Success,
            SagaStatus::Failed,
            SagaStatus::Reverted,
            SagaStatus::RevertFailed,
            SagaStatus::ManualReview,
            SagaStatus::Timeout,
            SagaStatus::SystemError,
        ]
    }

    async fn handle(
        &self,
        ctx: &mut SagaContext,
        deps: &HandlerDeps,
        _registry: &HandlerRegistry,
    ) -> Result<(), SagaError> {
        // After-hooks run regardless of outcome; failures are logged and
        // discarded, never propagated or allowed to undo the already-
        // committed terminal status (spec §6.4).
        if let Err(e) = deps.hooks.after_transition(ctx, ctx.status, ctx.status).await {
            warn!(order_id = %ctx.order_id, error = %e, "after-hook failed on terminal entry");
        }

        let duration = chrono::Utc::now() - ctx.created_at;
        info!(
            order_id = %ctx.order_id,
            order_no = %ctx.order_no,
            status = %ctx.status,
            duration_ms = duration.num_milliseconds(),
            steps_processed = ctx.processed_step_ids.len(),
            "saga reached terminal status"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::handlers::StepLookup;
    use crate::hooks::PassthroughHookChain;
    use crate::persistence::InMemoryPersistence;
    use crate::types::{CustomerId, OrderId, OrderNo};
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn terminal_handle_does_not_change_status() {
        let handler = TerminalHandler;
        let mut ctx = SagaContext::new(
            OrderId::new(),
            OrderNo::from("ORD-1"),
            CustomerId::from("c"),
            vec![],
            Duration::minutes(30),
        );
        ctx.status = SagaStatus::Success;
        let deps = HandlerDeps {
            persistence: Arc::new(InMemoryPersistence::new()),
            hooks: Arc::new(PassthroughHookChain),
            steps: Arc::new(StepLookup::new()),
            config: Arc::new(EngineConfig::default()),
        };
        let registry = HandlerRegistry::new();
        handler.handle(&mut ctx, &deps, &registry).await.unwrap();
        assert_eq!(ctx.status, SagaStatus::Success);
    }
}
