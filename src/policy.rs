//! `evaluateFailedStep` (spec §4.6) and the policy decisions around it.

use crate::config::EngineConfig;
use crate::types::{SagaContext, SagaStatus};

/// Decide what a forward-step failure transitions the saga to.
///
/// A pure function of `(forward plan + processed steps, compensation_allowed,
/// remaining_time)` (spec §8.2); the one side effect — extending `timeout_at`
/// before returning `Reverting` — does not change the decision itself, only
/// the budget available to carry it out.
pub fn evaluate_failed_step(ctx: &mut SagaContext, config: &EngineConfig) -> SagaStatus {
    if ctx.plan.is_empty() || ctx.current_step_index == 0 {
        return SagaStatus::Failed;
    }

    let any_non_undoable_succeeded = ctx.processed_step_ids.iter().any(|step_id| {
        ctx.plan
            .iter()
            .find(|p| &p.step_id == step_id)
            .map(|p| config.is_non_undoable(&p.action))
            .unwrap_or(false)
    });
    if any_non_undoable_succeeded {
        return SagaStatus::ManualReview;
    }

    if ctx.compensation_allowed && ctx.remaining_time() > config.min_compensation_budget() {
        ctx.extend_timeout_if_needed(config.min_compensation_budget());
        return SagaStatus::Reverting;
    }

    SagaStatus::RevertFailed
}
