//! Error taxonomy for the orchestration engine (spec §7).

use thiserror::Error;

use super::ids::{OrderId, OrderNo, StepId};
use super::status::SagaStatus;

/// Stable, numeric error codes with retry/compensation predicates.
///
/// Grouped the way spec §7 groups them: input, business, external-service,
/// internal, and saga errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    NotFound,
    DuplicateRequest,
    ValidationFailed,
    AuthorizationDenied,

    // Business errors
    InsufficientInventory,
    InsufficientBalance,
    PaymentDeclined,
    OrderCancelled,

    // External-service errors (retryable)
    UpstreamUnavailable,
    UpstreamTimeout,

    // Internal errors (retryable only at the persistence layer)
    PersistenceFailure,
    ConfigurationError,
    UnexpectedError,

    // Saga errors
    StateHandlerNotFound,
    StepExecutionFailed,
    CompensationFailed,
    SagaTimeout,
    InvalidTransition,
}

impl ErrorCode {
    /// Stable numeric code suitable for cross-service logging/metrics.
    pub fn numeric(self) -> u32 {
        use ErrorCode::*;
        match self {
            InvalidInput => 1000,
            NotFound => 1001,
            DuplicateRequest => 1002,
            ValidationFailed => 1003,
            AuthorizationDenied => 1004,
            InsufficientInventory => 2000,
            InsufficientBalance => 2001,
            PaymentDeclined => 2002,
            OrderCancelled => 2003,
            UpstreamUnavailable => 3000,
            UpstreamTimeout => 3001,
            PersistenceFailure => 4000,
            ConfigurationError => 4001,
            UnexpectedError => 4002,
            StateHandlerNotFound => 5000,
            StepExecutionFailed => 5001,
            CompensationFailed => 5002,
            SagaTimeout => 5003,
            InvalidTransition => 5004,
        }
    }

    pub fn is_retryable(self) -> bool {
        use ErrorCode::*;
        matches!(self, UpstreamUnavailable | UpstreamTimeout | PersistenceFailure)
    }

    pub fn requires_compensation(self) -> bool {
        use ErrorCode::*;
        matches!(
            self,
            InsufficientInventory
                | InsufficientBalance
                | PaymentDeclined
                | UpstreamUnavailable
                | UpstreamTimeout
                | StepExecutionFailed
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}({})", self.numeric())
    }
}

/// Persistence-port errors (spec §6.2).
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("order id {0} already exists")]
    DuplicateOrderId(OrderId),

    #[error("order number {0} already exists")]
    DuplicateOrderNo(OrderNo),

    #[error("optimistic lock conflict for order {0}: updated_at witness did not match")]
    LockConflict(OrderId),

    #[error("lock already held for order {0}")]
    AlreadyLocked(OrderId),

    #[error("saga {0} not found")]
    NotFound(OrderId),

    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// Top-level orchestration errors (spec §7 "Saga errors").
#[derive(Error, Debug, Clone)]
pub enum SagaError {
    #[error("no state handler registered for status {0}")]
    StateHandlerNotFound(SagaStatus),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: SagaStatus, to: SagaStatus },

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("saga {0} not found")]
    NotFound(OrderId),

    #[error("saga {0} timed out")]
    SagaTimeout(OrderId),

    #[error("compensation failed for step {step_id}: {reason}")]
    CompensationFailed { step_id: StepId, reason: String },

    #[error("step {step_id} execution failed: {reason}")]
    StepExecutionFailed { step_id: StepId, reason: String },

    #[error("hook chain rejected saga: {0}")]
    HookRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SagaError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SagaError::StateHandlerNotFound(_) => ErrorCode::StateHandlerNotFound,
            SagaError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            SagaError::Persistence(_) => ErrorCode::PersistenceFailure,
            SagaError::NotFound(_) => ErrorCode::NotFound,
            SagaError::SagaTimeout(_) => ErrorCode::SagaTimeout,
            SagaError::CompensationFailed { .. } => ErrorCode::CompensationFailed,
            SagaError::StepExecutionFailed { .. } => ErrorCode::StepExecutionFailed,
            SagaError::HookRejected(_) => ErrorCode::ValidationFailed,
            SagaError::Internal(_) => ErrorCode::UnexpectedError,
        }
    }
}
