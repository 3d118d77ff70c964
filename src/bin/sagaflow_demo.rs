//! Sagaflow demo CLI
//!
//! Runs a scripted four-step order saga end to end against the in-memory
//! persistence port, to exercise the engine without a real process
//! bootstrap or downstream services.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use sagaflow::{
    build_engine, CustomerId, EngineConfig, InMemoryPersistence, OrderNo, PassthroughHookChain, PlannedStepSpec,
    SagaContext, SagaStatus, SagaStep, StartSagaCommand, StepId, StepResult,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sagaflow-demo")]
#[command(about = "Run a scripted saga through the sagaflow engine")]
#[command(version = "0.1.0")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Every step succeeds; the saga reaches SUCCESS.
    HappyPath,
    /// The shipment step fails mid-flow; already-applied steps are compensated.
    FailAndCompensate,
    /// The first step fails before anything else has run.
    FailFirstStep,
}

struct ScriptedStep {
    action: &'static str,
    service_type: &'static str,
    succeed: bool,
}

#[async_trait]
impl SagaStep for ScriptedStep {
    fn action(&self) -> &str {
        self.action
    }

    fn service_type(&self) -> &str {
        self.service_type
    }

    fn is_compensatable(&self) -> bool {
        true
    }

    async fn execute(&self, _ctx: &SagaContext, step_id: &StepId) -> StepResult {
        if self.succeed {
            info!(step = %step_id, action = self.action, "step executed");
            StepResult::succeeded(Some(format!("ref-{step_id}")))
        } else {
            info!(step = %step_id, action = self.action, "step failed");
            StepResult::failed(sagaflow::ErrorCode::UpstreamUnavailable, "downstream service unavailable")
        }
    }

    async fn compensate(&self, _ctx: &SagaContext, step_id: &StepId) -> StepResult {
        info!(step = %step_id, action = self.action, "step compensated");
        StepResult::completed()
    }
}

fn plan() -> Vec<PlannedStepSpec> {
    vec![
        PlannedStepSpec { action: "RESERVE_INVENTORY".into(), service_type: "inventory".into(), compensatable: true },
        PlannedStepSpec { action: "CHARGE_PAYMENT".into(), service_type: "payments".into(), compensatable: true },
        PlannedStepSpec { action: "CREATE_SHIPMENT".into(), service_type: "shipping".into(), compensatable: true },
        PlannedStepSpec { action: "SEND_NOTIFICATION".into(), service_type: "notify".into(), compensatable: false },
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut lookup = sagaflow::handlers::StepLookup::new();
    let outcomes: &[(&str, &str, bool)] = match cli.command {
        Commands::HappyPath => &[
            ("RESERVE_INVENTORY", "inventory", true),
            ("CHARGE_PAYMENT", "payments", true),
            ("CREATE_SHIPMENT", "shipping", true),
            ("SEND_NOTIFICATION", "notify", true),
        ],
        Commands::FailAndCompensate => &[
            ("RESERVE_INVENTORY", "inventory", true),
            ("CHARGE_PAYMENT", "payments", true),
            ("CREATE_SHIPMENT", "shipping", false),
            ("SEND_NOTIFICATION", "notify", true),
        ],
        Commands::FailFirstStep => &[
            ("RESERVE_INVENTORY", "inventory", false),
            ("CHARGE_PAYMENT", "payments", true),
            ("CREATE_SHIPMENT", "shipping", true),
            ("SEND_NOTIFICATION", "notify", true),
        ],
    };
    for (action, service_type, succeed) in outcomes {
        lookup.register(Arc::new(ScriptedStep { action, service_type, succeed: *succeed }));
    }

    let engine = build_engine(
        Arc::new(InMemoryPersistence::new()),
        Arc::new(PassthroughHookChain),
        Arc::new(lookup),
        Arc::new(EngineConfig::default()),
    );

    let ctx = engine
        .start(StartSagaCommand {
            order_no: OrderNo::from("DEMO-ORDER-1"),
            customer_id: CustomerId::from("demo-customer"),
            steps: plan(),
            metadata: Default::default(),
            timeout: None,
        })
        .await;

    println!("final status: {:?}", ctx.status);
    println!("processed steps: {}", ctx.processed_step_ids.len());
    if ctx.status == SagaStatus::Reverted || ctx.status == SagaStatus::RevertFailed {
        println!("compensation queue remaining: {}", ctx.compensation_queue.len());
    }
    for log in &ctx.step_logs {
        println!(
            "  [{}] {} {} -> {:?}",
            if log.is_compensation { "compensate" } else { "execute" },
            log.action,
            log.step_id,
            log.status
        );
    }

    Ok(())
}
