//! The outcome a step implementation reports back to the engine (spec §3 `StepResult`).

use serde::{Deserialize, Serialize};

use super::error::ErrorCode;
use super::status::StepStatus;

/// Error detail attached to a non-success `StepResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub code: ErrorCode,
    pub message: String,
}

/// What a `SagaStep::execute`/`compensate` call reports.
///
/// Spec §3 describes this as a plain struct rather than a tagged union; we
/// keep that shape (so persistence can serialize it directly) but only
/// construct it through the factory functions below, which enforce the
/// valid combinations: a success carries no error, a failure always
/// carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub error: Option<StepError>,
    pub external_ref_id: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StepResult {
    pub fn succeeded(external_ref_id: impl Into<Option<String>>) -> Self {
        Self {
            status: StepStatus::Succeeded,
            error: None,
            external_ref_id: external_ref_id.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn completed() -> Self {
        Self {
            status: StepStatus::Completed,
            error: None,
            external_ref_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// An async step that has not yet resolved; the engine parks the saga
    /// in `PENDING` to await a later `resume(callback)`/query (spec §4.4).
    pub fn processing() -> Self {
        Self {
            status: StepStatus::Pending,
            error: None,
            external_ref_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            error: Some(StepError { code, message: message.into() }),
            external_ref_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Rejected,
            error: Some(StepError { code, message: message.into() }),
            external_ref_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// The outcome of a crashed/unresumed call could not be determined;
    /// a recovery sweep must reconcile it with the downstream service.
    pub fn unknown(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Unknown,
            error: Some(StepError { code, message: message.into() }),
            external_ref_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn timed_out(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Timeout,
            error: Some(StepError { code, message: message.into() }),
            external_ref_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }
}
