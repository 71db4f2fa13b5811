//! Supporting status types shared by Garden resources

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// State of the last operation performed on a Garden resource
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LastOperationState {
    /// Operation is queued
    #[default]
    Pending,
    /// Operation is in progress
    Processing,
    /// Operation completed successfully
    Succeeded,
    /// Operation hit an error and will be retried by its controller
    Error,
    /// Operation failed permanently
    Failed,
    /// Operation was aborted
    Aborted,
}

impl LastOperationState {
    /// Returns true while the owning controller is still working on the operation
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Returns true if the operation reported an error outcome
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Failed)
    }
}

impl std::fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Processing => write!(f, "Processing"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Error => write!(f, "Error"),
            Self::Failed => write!(f, "Failed"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Kind of the last operation performed on a Garden resource
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LastOperationType {
    /// First reconciliation after creation
    Create,
    /// Any later reconciliation
    #[default]
    Reconcile,
    /// Teardown
    Delete,
}

/// Last operation recorded in a resource's status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Kind of operation
    #[serde(rename = "type", default)]
    pub type_: LastOperationType,

    /// Current state of the operation
    #[serde(default)]
    pub state: LastOperationState,

    /// Human-readable progress description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Completion percentage (0-100)
    #[serde(default)]
    pub progress: i32,

    /// When the state last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

/// Last error recorded in a resource's status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Human-readable error description
    #[serde(default)]
    pub description: String,

    /// Well-known error codes (e.g., "ERR_INFRA_QUOTA_EXCEEDED")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(LastOperationState::Pending.is_in_progress());
        assert!(LastOperationState::Processing.is_in_progress());
        assert!(!LastOperationState::Succeeded.is_in_progress());

        assert!(LastOperationState::Error.is_error());
        assert!(LastOperationState::Failed.is_error());
        assert!(!LastOperationState::Aborted.is_error());
        assert!(!LastOperationState::Succeeded.is_error());
    }

    #[test]
    fn test_last_operation_deserializes_wire_names() {
        let op: LastOperation = serde_json::from_value(serde_json::json!({
            "type": "Create",
            "state": "Succeeded",
            "description": "Backup infrastructure reconciled",
            "progress": 100,
            "lastUpdateTime": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(op.type_, LastOperationType::Create);
        assert_eq!(op.state, LastOperationState::Succeeded);
        assert_eq!(op.progress, 100);
        assert!(op.last_update_time.is_some());
    }

    #[test]
    fn test_last_error_defaults() {
        let err: LastError = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(err.description.is_empty());
        assert!(err.codes.is_empty());
    }
}
