//! Hook chain contract (spec §6.4). The concrete validation/dedup/
//! notification logic a production deployment plugs in here is out of
//! scope; this module only specifies the interface and ships a no-op
//! default so the engine is runnable without one.

use async_trait::async_trait;
use tracing::debug;

use crate::types::{SagaContext, SagaStatus};

/// Why a before-hook aborted the chain (spec §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookRejectReason {
    Duplicate,
    Validation,
    Authorization,
    SystemError,
}

/// What a hook reports back to the engine about a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Proceed with the transition as planned.
    Continue,
    /// Abort the chain. `InitHandler` classifies `reason` into the saga's
    /// terminal status (spec §4.3).
    Reject { reason: HookRejectReason, message: String },
}

impl HookOutcome {
    pub fn reject(reason: HookRejectReason, message: impl Into<String>) -> Self {
        Self::Reject { reason, message: message.into() }
    }
}

/// A hook implementation is expected not to throw; an uncaught error at the
/// call boundary is folded into `HookRejectReason::SystemError` by the
/// caller rather than propagated as a Rust error (spec §6.4, §7).
pub type HookResult = Result<HookOutcome, String>;

/// External collaborator invoked around every status transition (spec
/// §4.9, §6.4). Implementations handle request validation, duplicate
/// suppression, and outbound notifications; none of that logic is this
/// crate's concern.
#[async_trait]
pub trait HookChain: Send + Sync {
    /// Called before a transition is applied. Returning `Reject` prevents
    /// the transition from taking effect.
    async fn before_transition(&self, ctx: &SagaContext, to: SagaStatus) -> HookResult;

    /// Called after a transition has been durably committed. Failures here
    /// are logged but never roll back the already-committed transition
    /// (spec §6.4: notification delivery is best-effort).
    async fn after_transition(&self, ctx: &SagaContext, from: SagaStatus, to: SagaStatus) -> HookResult;
}

/// No-op hook chain: always continues, never notifies anyone. The default
/// wired up when a deployment hasn't supplied its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughHookChain;

#[async_trait]
impl HookChain for PassthroughHookChain {
    async fn before_transition(&self, ctx: &SagaContext, to: SagaStatus) -> HookResult {
        debug!(order_id = %ctx.order_id, to = %to, "passthrough hook: before_transition");
        Ok(HookOutcome::Continue)
    }

    async fn after_transition(&self, ctx: &SagaContext, from: SagaStatus, to: SagaStatus) -> HookResult {
        debug!(order_id = %ctx.order_id, from = %from, to = %to, "passthrough hook: after_transition");
        Ok(HookOutcome::Continue)
    }
}
