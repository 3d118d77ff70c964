//! Saga and step lifecycle status enumerations, predicates, and the
//! transition table that governs how `SagaStatus` may change.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a saga instance (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaStatus {
    Init,

    Processing,
    Pending,
    Resuming,
    RecoveryProcessing,

    Reverting,
    RevertingPending,
    ResumingReverting,
    RecoveryReverting,

    Success,
    Failed,
    Reverted,
    RevertFailed,
    ManualReview,
    Timeout,
    SystemError,
}

impl SagaStatus {
    /// No outbound transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SagaStatus::Success
                | SagaStatus::Failed
                | SagaStatus::Reverted
                | SagaStatus::RevertFailed
                | SagaStatus::ManualReview
                | SagaStatus::Timeout
                | SagaStatus::SystemError
        )
    }

    /// Forward-flow group (INIT excluded; it precedes the forward flow).
    pub fn is_processing(self) -> bool {
        matches!(
            self,
            SagaStatus::Processing
                | SagaStatus::Pending
                | SagaStatus::Resuming
                | SagaStatus::RecoveryProcessing
        )
    }

    /// Reverting-flow group.
    pub fn is_reverting(self) -> bool {
        matches!(
            self,
            SagaStatus::Reverting
                | SagaStatus::RevertingPending
                | SagaStatus::ResumingReverting
                | SagaStatus::RecoveryReverting
        )
    }

    /// Parked awaiting an external callback (forward or reverting).
    pub fn is_pending(self) -> bool {
        matches!(self, SagaStatus::Pending | SagaStatus::RevertingPending)
    }

    /// Terminal outcomes that represent a failure of some kind.
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            SagaStatus::Failed
                | SagaStatus::RevertFailed
                | SagaStatus::ManualReview
                | SagaStatus::Timeout
                | SagaStatus::SystemError
        )
    }

    /// Maps a status to the one a *recovery sweep* classifies it as.
    /// Idempotent: `recovery_of(recovery_of(s)) == recovery_of(s)`.
    ///
    /// This is a pure classification function, not a transition: no edge
    /// in the transition table ever assigns `RecoveryProcessing` or
    /// `RecoveryReverting` to a saga's live status (see SPEC_FULL.md
    /// Open Question resolution #5). It exists for tagging recovered
    /// sagas for observability.
    pub fn recovery_of(self) -> SagaStatus {
        match self {
            SagaStatus::Processing | SagaStatus::Pending => SagaStatus::RecoveryProcessing,
            SagaStatus::Reverting | SagaStatus::RevertingPending => SagaStatus::RecoveryReverting,
            other => other,
        }
    }

    /// Maps a status to the one a `resume` dispatch actually assigns.
    /// Idempotent: `resume_of(resume_of(s)) == resume_of(s)`.
    pub fn resume_of(self) -> SagaStatus {
        match self {
            SagaStatus::Processing | SagaStatus::Pending => SagaStatus::Resuming,
            SagaStatus::Reverting | SagaStatus::RevertingPending => SagaStatus::ResumingReverting,
            other => other,
        }
    }

    /// Statuses this one may transition to in one edge, per spec §4.2,
    /// excluding the universal `<any non-terminal> -> Timeout` edge
    /// (checked separately, since it is conditioned on wall-clock time
    /// rather than an event).
    fn edges(self) -> &'static [SagaStatus] {
        use SagaStatus::*;
        match self {
            Init => &[Processing, Failed, SystemError],
            Processing => &[
                Processing,
                Success,
                Pending,
                Reverting,
                Failed,
                ManualReview,
                RevertFailed,
                SystemError,
            ],
            Pending => &[Processing, Reverting],
            Reverting => &[Reverting, Reverted, RevertingPending, RevertFailed],
            RevertingPending => &[Reverting, Reverted, RevertFailed],
            Resuming => &[
                Processing,
                Pending,
                Success,
                Reverting,
                ManualReview,
                RevertFailed,
                SystemError,
            ],
            ResumingReverting => &[Reverting, RevertingPending, Reverted, RevertFailed, SystemError],
            // No edge in §4.2 targets these; they are classification-only.
            RecoveryProcessing | RecoveryReverting => &[],
            Success | Failed | Reverted | RevertFailed | ManualReview | Timeout | SystemError => {
                &[]
            }
        }
    }

    /// Whether `self -> to` is a valid edge, ignoring the timeout edge
    /// (callers check `SagaContext::is_timed_out` separately before
    /// allowing a transition to `Timeout`).
    pub fn can_transition_to(self, to: SagaStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == SagaStatus::Timeout {
            return true;
        }
        self.edges().contains(&to)
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Lifecycle status of an individual step attempt (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Executing,
    Processing,
    Succeeded,
    Failed,
    Timeout,
    Skipped,
    Unknown,
    Completed,
    Rejected,
    NeedsCompensation,
    Compensating,
    Compensated,
    CompensationFailed,
}

impl StepStatus {
    pub fn is_success(self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Completed)
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            StepStatus::Failed | StepStatus::Rejected | StepStatus::CompensationFailed
        )
    }

    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            StepStatus::Pending
                | StepStatus::Executing
                | StepStatus::Processing
                | StepStatus::Compensating
        )
    }

    /// A step-status that `updateStatus` must never overwrite.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded
                | StepStatus::Completed
                | StepStatus::Failed
                | StepStatus::Rejected
                | StepStatus::Skipped
                | StepStatus::Compensated
                | StepStatus::CompensationFailed
        )
    }

    pub fn needs_compensation(self) -> bool {
        matches!(self, StepStatus::NeedsCompensation)
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, StepStatus::Failed | StepStatus::Timeout | StepStatus::Unknown)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
