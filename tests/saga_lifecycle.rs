//! End-to-end saga lifecycle scenarios driven entirely through `SagaEngine`
//! and the in-memory persistence port, using the four-step order plan
//! (RESERVE_INVENTORY, CHARGE_PAYMENT, CREATE_SHIPMENT, SEND_NOTIFICATION)
//! as the reference order of operations.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sagaflow::{
    build_engine, CustomerId, EngineConfig, ErrorCode, InMemoryPersistence, OrderNo, PassthroughHookChain,
    PlannedStepSpec, ResumeSagaCommand, SagaContext, SagaEngine, SagaStatus, SagaStep, StartSagaCommand, StepId,
    StepResult,
};
use sagaflow::handlers::StepLookup;

struct ScriptedStep {
    action: &'static str,
    outcome: Mutex<Vec<StepResult>>,
}

impl ScriptedStep {
    fn always(action: &'static str, outcome: StepResult) -> Arc<Self> {
        Arc::new(Self { action, outcome: Mutex::new(vec![outcome]) })
    }
}

#[async_trait]
impl SagaStep for ScriptedStep {
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
        let mut queue = self.outcome.lock().unwrap();
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        }
    }

    async fn compensate(&self, _ctx: &SagaContext, _step_id: &StepId) -> StepResult {
        StepResult::completed()
    }

    async fn query(&self, _ctx: &SagaContext, _step_id: &StepId) -> StepResult {
        StepResult::succeeded(None)
    }
}

fn engine_with(steps: Vec<Arc<ScriptedStep>>) -> SagaEngine {
    engine_with_config(steps, EngineConfig::default())
}

fn engine_with_config(steps: Vec<Arc<ScriptedStep>>, config: EngineConfig) -> SagaEngine {
    let mut lookup = StepLookup::new();
    for step in steps {
        lookup.register(step);
    }
    build_engine(
        Arc::new(InMemoryPersistence::new()),
        Arc::new(PassthroughHookChain),
        Arc::new(lookup),
        Arc::new(config),
    )
}

fn full_plan() -> Vec<PlannedStepSpec> {
    vec![
        PlannedStepSpec { action: "RESERVE_INVENTORY".into(), service_type: "inventory".into(), compensatable: true },
        PlannedStepSpec { action: "CHARGE_PAYMENT".into(), service_type: "payments".into(), compensatable: true },
        PlannedStepSpec { action: "CREATE_SHIPMENT".into(), service_type: "shipping".into(), compensatable: true },
        PlannedStepSpec { action: "SEND_NOTIFICATION".into(), service_type: "notify".into(), compensatable: false },
    ]
}

fn start_cmd(order_no: &str, steps: Vec<PlannedStepSpec>) -> StartSagaCommand {
    StartSagaCommand {
        order_no: OrderNo::from(order_no),
        customer_id: CustomerId::from("cust-1"),
        steps,
        metadata: Default::default(),
        timeout: None,
    }
}

#[tokio::test]
async fn happy_path_runs_all_four_steps_to_success() {
    let engine = engine_with(vec![
        ScriptedStep::always("RESERVE_INVENTORY", StepResult::succeeded(None)),
        ScriptedStep::always("CHARGE_PAYMENT", StepResult::succeeded(None)),
        ScriptedStep::always("CREATE_SHIPMENT", StepResult::succeeded(None)),
        ScriptedStep::always("SEND_NOTIFICATION", StepResult::succeeded(None)),
    ]);
    let ctx = engine.start(start_cmd("ORD-HAPPY", full_plan())).await;
    assert_eq!(ctx.status, SagaStatus::Success);
    assert_eq!(ctx.processed_step_ids.len(), 4);
    assert_eq!(ctx.compensation_queue.len(), 0);
}

#[tokio::test]
async fn first_step_failure_skips_compensation_and_goes_straight_to_failed() {
    let engine = engine_with(vec![ScriptedStep::always(
        "RESERVE_INVENTORY",
        StepResult::failed(ErrorCode::InsufficientInventory, "out of stock"),
    )]);
    let ctx = engine.start(start_cmd("ORD-FIRST-FAIL", full_plan())).await;
    assert_eq!(ctx.status, SagaStatus::Failed);
    assert!(ctx.processed_step_ids.is_empty());
}

#[tokio::test]
async fn mid_flow_failure_compensates_already_applied_steps_in_reverse_order() {
    let engine = engine_with(vec![
        ScriptedStep::always("RESERVE_INVENTORY", StepResult::succeeded(None)),
        ScriptedStep::always("CHARGE_PAYMENT", StepResult::failed(ErrorCode::PaymentDeclined, "card declined")),
    ]);
    // Only RESERVE_INVENTORY and CHARGE_PAYMENT are planned, so the
    // compensation step plan only ever needs to cover the former.
    let steps = vec![
        PlannedStepSpec { action: "RESERVE_INVENTORY".into(), service_type: "inventory".into(), compensatable: true },
        PlannedStepSpec { action: "CHARGE_PAYMENT".into(), service_type: "payments".into(), compensatable: true },
    ];
    let ctx = engine.start(start_cmd("ORD-MIDFAIL", steps)).await;
    assert_eq!(ctx.status, SagaStatus::Reverted);
    assert_eq!(ctx.processed_step_ids.len(), 1);
    assert!(ctx.compensation_queue.is_empty());
    let compensations: Vec<_> = ctx.step_logs.iter().filter(|l| l.is_compensation).collect();
    assert_eq!(compensations.len(), 1);
    assert_eq!(compensations[0].action, "RESERVE_INVENTORY");
}

#[tokio::test]
async fn success_of_a_non_undoable_step_forces_manual_review_on_later_failure() {
    // Default config marks CREATE_SHIPMENT/SEND_NOTIFICATION non-undoable;
    // once CREATE_SHIPMENT succeeds a later failure can't revert through it.
    let engine = engine_with(vec![
        ScriptedStep::always("RESERVE_INVENTORY", StepResult::succeeded(None)),
        ScriptedStep::always("CHARGE_PAYMENT", StepResult::succeeded(None)),
        ScriptedStep::always("CREATE_SHIPMENT", StepResult::succeeded(None)),
        ScriptedStep::always("SEND_NOTIFICATION", StepResult::failed(ErrorCode::UpstreamUnavailable, "notify down")),
    ]);
    let ctx = engine.start(start_cmd("ORD-MANUAL", full_plan())).await;
    assert_eq!(ctx.status, SagaStatus::ManualReview);
}

#[tokio::test]
async fn insufficient_timeout_budget_yields_revert_failed_instead_of_reverting() {
    let config = EngineConfig { min_compensation_budget_seconds: 10_000, ..EngineConfig::default() };
    let engine = engine_with_config(
        vec![
            ScriptedStep::always("RESERVE_INVENTORY", StepResult::succeeded(None)),
            ScriptedStep::always("CHARGE_PAYMENT", StepResult::failed(ErrorCode::PaymentDeclined, "declined")),
        ],
        config,
    );
    let steps = vec![
        PlannedStepSpec { action: "RESERVE_INVENTORY".into(), service_type: "inventory".into(), compensatable: true },
        PlannedStepSpec { action: "CHARGE_PAYMENT".into(), service_type: "payments".into(), compensatable: true },
    ];
    let mut cmd = start_cmd("ORD-BUDGET", steps);
    cmd.timeout = Some(chrono::Duration::seconds(5));
    let ctx = engine.start(cmd).await;
    assert_eq!(ctx.status, SagaStatus::RevertFailed);
}

#[tokio::test]
async fn async_pending_step_parks_and_resumes_on_callback() {
    let engine = engine_with(vec![ScriptedStep::always("RESERVE_INVENTORY", StepResult::processing())]);
    let steps = vec![PlannedStepSpec {
        action: "RESERVE_INVENTORY".into(),
        service_type: "inventory".into(),
        compensatable: true,
    }];
    let ctx = engine.start(start_cmd("ORD-ASYNC", steps)).await;
    assert_eq!(ctx.status, SagaStatus::Pending);

    let resumed = engine
        .resume(ResumeSagaCommand {
            order_id: ctx.order_id,
            step_id: Some(ctx.plan[0].step_id.clone()),
            callback_result: Some(StepResult::succeeded(Some("ext-ref-1".to_string()))),
            is_recovery: false,
            source: "webhook".into(),
        })
        .await
        .unwrap();
    assert_eq!(resumed.status, SagaStatus::Success);
}

struct UnknownThenRetryStep;

#[async_trait]
impl SagaStep for UnknownThenRetryStep {
    fn action(&self) -> &str {
        "RESERVE_INVENTORY"
    }
    fn service_type(&self) -> &str {
        "inventory"
    }
    fn is_compensatable(&self) -> bool {
        true
    }
    async fn execute(&self, _ctx: &SagaContext, _step_id: &StepId) -> StepResult {
        // Only reached via ResumingHandler's bounded UNKNOWN retry.
        StepResult::succeeded(None)
    }
    async fn query(&self, _ctx: &SagaContext, _step_id: &StepId) -> StepResult {
        StepResult::unknown(ErrorCode::UpstreamUnavailable, "crashed mid-call, outcome in doubt")
    }
}

#[tokio::test]
async fn crash_recovery_resolves_unknown_outcome_via_query_then_resumes() {
    // query() answers UNKNOWN; ResumingHandler's bounded retry then calls
    // execute(), which answers SUCCEEDED.
    let mut lookup = StepLookup::new();
    lookup.register(Arc::new(UnknownThenRetryStep));
    let engine = build_engine(
        Arc::new(InMemoryPersistence::new()),
        Arc::new(PassthroughHookChain),
        Arc::new(lookup),
        Arc::new(EngineConfig::default()),
    );

    let steps = vec![PlannedStepSpec {
        action: "RESERVE_INVENTORY".into(),
        service_type: "inventory".into(),
        compensatable: true,
    }];
    let ctx = engine.start(start_cmd("ORD-CRASH", steps)).await;
    assert_eq!(ctx.status, SagaStatus::Pending);

    // Simulate the crash-recovery resubmission: `resume_of()` maps the
    // parked status onto RESUMING, whose handler queries the step (default
    // impl on our stub answers SUCCEEDED) and resolves the saga forward.
    let resumed = engine
        .resume(ResumeSagaCommand {
            order_id: ctx.order_id,
            step_id: None,
            callback_result: None,
            is_recovery: true,
            source: "recovery_sweep".into(),
        })
        .await
        .unwrap();
    assert_eq!(resumed.status, SagaStatus::Success);
}
