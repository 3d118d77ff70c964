//! The saga's working state (spec §3 `SagaContext`, §4 transitions).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::SagaError;
use super::ids::{CustomerId, OrderId, OrderNo, StepId};
use super::result::StepResult;
use super::status::{SagaStatus, StepStatus};
use super::step::StepLog;

/// One entry of the saga's forward plan: which action runs at which index,
/// and whether it can be compensated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step_id: StepId,
    pub action: String,
    pub service_type: String,
    pub compensatable: bool,
}

/// The full, mutable state of one saga instance as it moves through the
/// lifecycle. Handlers read and mutate this; persistence is the only thing
/// that durably commits it (spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaContext {
    pub order_id: OrderId,
    pub order_no: OrderNo,
    pub customer_id: CustomerId,

    pub status: SagaStatus,

    /// The ordered forward plan, fixed at saga creation.
    pub plan: Vec<PlannedStep>,
    /// Cursor into `plan` for the next forward step to attempt.
    pub current_step_index: usize,
    /// Step ids that have reached a terminal, successful step-status.
    pub processed_step_ids: Vec<StepId>,
    /// Reverse-order queue of steps still awaiting compensation.
    pub compensation_queue: Vec<PlannedStep>,

    pub step_logs: Vec<StepLog>,
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Most recent step outcome, for observability and terminal messaging.
    pub last_result: Option<StepResult>,
    /// Policy flag: whether this saga is allowed to compensate at all.
    pub compensation_allowed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
}

impl SagaContext {
    pub fn new(
        order_id: OrderId,
        order_no: OrderNo,
        customer_id: CustomerId,
        plan: Vec<PlannedStep>,
        timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            order_no,
            customer_id,
            status: SagaStatus::Init,
            plan,
            current_step_index: 0,
            processed_step_ids: Vec::new(),
            compensation_queue: Vec::new(),
            step_logs: Vec::new(),
            metadata: serde_json::Map::new(),
            last_result: None,
            compensation_allowed: true,
            created_at: now,
            updated_at: now,
            timeout_at: now + timeout,
        }
    }

    /// Apply a status change, enforcing the transition table (spec §4.2).
    /// Does not touch `updated_at`; persistence stamps that on a confirmed
    /// optimistic-lock write (spec §5, §6.2).
    pub fn transition_to(&mut self, to: SagaStatus) -> Result<(), SagaError> {
        if !self.status.can_transition_to(to) {
            return Err(SagaError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step_index + 1 >= self.plan.len()
    }

    pub fn next_forward_step(&self) -> Option<&PlannedStep> {
        self.plan.get(self.current_step_index)
    }

    /// Record that the step at the current cursor succeeded and advance.
    pub fn mark_step_processed(&mut self, step_id: StepId) {
        self.processed_step_ids.push(step_id);
        self.current_step_index += 1;
    }

    /// Build the reverse-order compensation queue from whatever steps have
    /// been processed so far, keeping only compensatable ones. Called once
    /// on the forward-to-reverting transition (spec §4.4).
    pub fn build_compensation_steps(&mut self) {
        self.compensation_queue = self
            .plan
            .iter()
            .filter(|p| self.processed_step_ids.contains(&p.step_id))
            .filter(|p| p.compensatable)
            .rev()
            .cloned()
            .collect();
    }

    /// Pop and return the next step awaiting compensation, in reverse order
    /// relative to forward execution.
    pub fn next_compensation_step(&mut self) -> Option<PlannedStep> {
        if self.compensation_queue.is_empty() {
            None
        } else {
            Some(self.compensation_queue.remove(0))
        }
    }

    pub fn remaining_time(&self) -> Duration {
        self.timeout_at - Utc::now()
    }

    pub fn is_timed_out(&self) -> bool {
        self.remaining_time() <= Duration::zero()
    }

    /// Push `timeout_at` out so the saga has at least `min_budget` left to
    /// finish compensating (spec §9 `MIN_COMPENSATION_BUDGET`).
    pub fn extend_timeout_if_needed(&mut self, min_budget: Duration) {
        if self.remaining_time() < min_budget {
            self.timeout_at = Utc::now() + min_budget;
        }
    }

    pub fn append_step_log(&mut self, log: StepLog) {
        self.step_logs.push(log);
    }

    pub fn set_last_result(&mut self, result: StepResult) {
        self.last_result = Some(result);
    }

    /// The most recent log entry for a given step id, if any.
    pub fn last_log_for(&self, step_id: &StepId) -> Option<&StepLog> {
        self.step_logs.iter().rev().find(|l| &l.step_id == step_id)
    }

    pub fn last_step_status(&self) -> Option<StepStatus> {
        self.step_logs.last().map(|l| l.status)
    }
}
