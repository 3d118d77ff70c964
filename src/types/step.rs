//! Step contract (spec §3 `StepLog`, §6.3 `SagaStep`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::SagaContext;
use super::ids::StepId;
use super::result::StepResult;
use super::status::StepStatus;

/// A persisted record of one step's attempted execution or compensation.
///
/// Appended to `SagaContext::step_logs`; never mutated in place once
/// `status` becomes final (spec §6.2's append-only guarantee).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLog {
    pub step_id: StepId,
    pub action: String,
    pub status: StepStatus,
    pub attempt: u32,
    pub is_compensation: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub external_ref_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepLog {
    pub fn started(step_id: StepId, action: impl Into<String>, attempt: u32, is_compensation: bool) -> Self {
        Self {
            step_id,
            action: action.into(),
            status: StepStatus::Executing,
            attempt,
            is_compensation,
            error_code: None,
            error_message: None,
            external_ref_id: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn apply_result(&mut self, result: &StepResult) {
        self.status = result.status;
        self.external_ref_id = result.external_ref_id.clone();
        if let Some(err) = &result.error {
            self.error_code = Some(err.code.to_string());
            self.error_message = Some(err.message.clone());
        }
        if !result.status.is_in_progress() {
            self.finished_at = Some(Utc::now());
        }
    }
}

/// An external, pluggable unit of work a saga orchestrates (spec §6.3).
///
/// Implementations own the downstream call (inventory reservation, payment
/// charge, shipment creation, ...); the engine only ever invokes them
/// through this trait, embedding `step_id` as the idempotency key on the
/// outbound call.
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Stable action name, e.g. `"RESERVE_INVENTORY"`, used in `StepId` and logs.
    fn action(&self) -> &str;

    /// The downstream service category, used in `StepId` (e.g. `"inventory"`).
    fn service_type(&self) -> &str;

    /// Whether this step's effects can be undone by `compensate`.
    fn is_compensatable(&self) -> bool;

    /// Execute the forward action. `step_id` must be used as the
    /// idempotency key on any outbound call so retries are safe.
    async fn execute(&self, ctx: &SagaContext, step_id: &StepId) -> StepResult;

    /// Side-effect-free check of a step's current outcome with the
    /// downstream service, used by `ResumingHandler` to resolve a step left
    /// in doubt by a crash (spec §6.3).
    async fn query(&self, ctx: &SagaContext, step_id: &StepId) -> StepResult {
        let _ = (ctx, step_id);
        StepResult::unknown(
            crate::types::error::ErrorCode::UpstreamUnavailable,
            "query not implemented for this step",
        )
    }

    /// Undo a previously successful execution. Only called for steps where
    /// `is_compensatable()` is true, and only in reverse order relative to
    /// forward execution (spec §4.4/§8.1).
    async fn compensate(&self, ctx: &SagaContext, step_id: &StepId) -> StepResult {
        let _ = (ctx, step_id);
        StepResult::completed()
    }

    /// Apply an externally-delivered outcome (e.g. a webhook callback) to
    /// this step's own bookkeeping. Must reject overwriting a final
    /// step-status (spec §6.3); the default accepts unconditionally, since
    /// a concrete step's internal status tracking is this crate's
    /// out-of-scope collaborator.
    async fn update_status(&self, ctx: &SagaContext, step_id: &StepId, result: StepResult) -> bool {
        let _ = (ctx, step_id, result);
        true
    }
}
