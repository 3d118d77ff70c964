//! Sagaflow
//!
//! A saga orchestration engine: a deterministic state machine that drives
//! multi-step distributed transactions to completion, persisting progress
//! between steps and compensating already-applied work when a later step
//! fails. Step implementations, the persistence backend, process bootstrap,
//! and the transport/API surface are all external collaborators this crate
//! only defines contracts for.

pub mod config;
pub mod engine;
pub mod handlers;
pub mod hooks;
pub mod persistence;
pub mod policy;
pub mod recovery;
pub mod types;

pub use config::EngineConfig;
pub use engine::{build_engine, EngineError, PlannedStepSpec, ResumeSagaCommand, SagaEngine, StartSagaCommand};
pub use hooks::{HookChain, HookOutcome, HookRejectReason, PassthroughHookChain};
pub use persistence::{InMemoryPersistence, PersistencePort};
pub use recovery::RecoverySweep;
pub use types::*;

use std::sync::Arc;

/// Everything needed to run a saga engine plus its background recovery
/// sweep, wired from a single `EngineConfig` the way a composition root
/// would assemble them at process startup.
pub struct Sagaflow {
    pub engine: Arc<SagaEngine>,
    pub recovery: RecoverySweep,
}

impl Sagaflow {
    pub fn new(
        persistence: Arc<dyn PersistencePort>,
        hooks: Arc<dyn HookChain>,
        steps: Arc<handlers::StepLookup>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let engine = Arc::new(build_engine(persistence.clone(), hooks, steps, config.clone()));
        let recovery = RecoverySweep::new(engine.clone(), persistence, config.recovery.clone());
        Self { engine, recovery }
    }

    /// Start the background recovery sweep. The engine itself is usable
    /// without ever calling this; recovery is an availability concern, not
    /// a correctness one (spec §5).
    pub fn start_recovery(&self) {
        self.recovery.start();
    }

    pub fn shutdown(&self) {
        self.recovery.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::StepLookup;
    use crate::types::{CustomerId, OrderNo, SagaStatus, SagaStep, StepId, StepResult};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl SagaStep for Noop {
        fn action(&self) -> &str {
            "RESERVE_INVENTORY"
        }
        fn service_type(&self) -> &str {
            "inventory"
        }
        fn is_compensatable(&self) -> bool {
            true
        }
        async fn execute(&self, _ctx: &types::SagaContext, _step_id: &StepId) -> StepResult {
            StepResult::succeeded(None)
        }
    }

    #[tokio::test]
    async fn composition_root_wires_a_working_engine() {
        let mut lookup = StepLookup::new();
        lookup.register(Arc::new(Noop));
        let app = Sagaflow::new(
            Arc::new(InMemoryPersistence::new()),
            Arc::new(PassthroughHookChain),
            Arc::new(lookup),
            Arc::new(EngineConfig::default()),
        );

        let ctx = app
            .engine
            .start(StartSagaCommand {
                order_no: OrderNo::from("ORD-1"),
                customer_id: CustomerId::from("c"),
                steps: vec![PlannedStepSpec {
                    action: "RESERVE_INVENTORY".into(),
                    service_type: "inventory".into(),
                    compensatable: true,
                }],
                metadata: Default::default(),
                timeout: None,
            })
            .await;
        assert_eq!(ctx.status, SagaStatus::Success);
    }
}
