//! BackupInfrastructure Custom Resource Definition
//!
//! A BackupInfrastructure represents the backup storage provisioned for one
//! Shoot's state. It lives in the Shoot's project namespace in the Garden
//! cluster and is reconciled by an external controller; arbor only reads its
//! status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{LastError, LastOperation};

/// Specification for a BackupInfrastructure
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "garden.sapcloud.io",
    version = "v1beta1",
    kind = "BackupInfrastructure",
    plural = "backupinfrastructures",
    namespaced,
    status = "BackupInfrastructureStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfrastructureSpec {
    /// Name of the Seed hosting the backup
    pub seed: String,

    /// UID of the Shoot whose state is backed up
    #[serde(rename = "shootUID")]
    pub shoot_uid: String,
}

/// Status of a BackupInfrastructure
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfrastructureStatus {
    /// Last operation performed by the reconciling controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Last error reported by the reconciling controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    /// Observed generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::LastOperationState;
    use kube::Resource;

    #[test]
    fn test_api_identity() {
        assert_eq!(BackupInfrastructure::group(&()), "garden.sapcloud.io");
        assert_eq!(BackupInfrastructure::version(&()), "v1beta1");
        assert_eq!(BackupInfrastructure::plural(&()), "backupinfrastructures");
    }

    #[test]
    fn test_deserialize_errored_record() {
        let infra: BackupInfrastructure = serde_json::from_value(serde_json::json!({
            "apiVersion": "garden.sapcloud.io/v1beta1",
            "kind": "BackupInfrastructure",
            "metadata": { "name": "shoot--dev--alpha--uid", "namespace": "garden-dev" },
            "spec": { "seed": "aws-eu1", "shootUID": "uid" },
            "status": {
                "lastOperation": { "type": "Reconcile", "state": "Error", "progress": 50 },
                "lastError": { "description": "quota exceeded" }
            }
        }))
        .unwrap();

        assert_eq!(infra.spec.shoot_uid, "uid");
        let status = infra.status.unwrap();
        assert_eq!(
            status.last_operation.map(|op| op.state),
            Some(LastOperationState::Error)
        );
        assert_eq!(status.last_error.unwrap().description, "quota exceeded");
    }

    #[test]
    fn test_status_optional() {
        let infra: BackupInfrastructure = serde_json::from_value(serde_json::json!({
            "apiVersion": "garden.sapcloud.io/v1beta1",
            "kind": "BackupInfrastructure",
            "metadata": { "name": "b", "namespace": "garden-dev" },
            "spec": { "seed": "s", "shootUID": "u" }
        }))
        .unwrap();
        assert!(infra.status.is_none());
    }
}
