//! Poll budgets and readiness policy for the wait steps
//!
//! Defaults reproduce the budgets production Shoots run with. A YAML file
//! may override any subset:
//!
//! ```yaml
//! kubeApiServer:
//!   interval: 5
//!   timeout: 600
//! podReadiness: all
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use arbor_common::{Error, Result};

use crate::poll::PollSpec;
use crate::readiness::PodReadinessPolicy;

/// Interval shared by every default budget
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const fn budget(timeout_secs: u64) -> PollSpec {
    PollSpec::new(DEFAULT_POLL_INTERVAL, Duration::from_secs(timeout_secs))
}

/// Configuration for a [`Botanist`](crate::Botanist)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotanistConfig {
    /// kube-apiserver Service gets a load balancer ingress
    pub kube_api_server_service: PollSpec,
    /// kube-apiserver pods report a ready container
    pub kube_api_server: PollSpec,
    /// BackupInfrastructure last operation succeeds
    pub backup_infrastructure: PollSpec,
    /// VPN tunnel into the Shoot is reachable
    pub vpn_connection: PollSpec,
    /// Seed or backup namespace is gone
    pub namespace_deletion: PollSpec,
    /// kube-addon-manager deployment is gone
    pub kube_addon_manager_deletion: PollSpec,
    /// How kube-apiserver pod readiness aggregates
    pub pod_readiness: PodReadinessPolicy,
}

impl Default for BotanistConfig {
    fn default() -> Self {
        Self {
            kube_api_server_service: budget(600),
            kube_api_server: budget(300),
            backup_infrastructure: budget(600),
            vpn_connection: budget(900),
            namespace_deletion: budget(900),
            kube_addon_manager_deletion: budget(600),
            pod_readiness: PodReadinessPolicy::default(),
        }
    }
}

impl BotanistConfig {
    /// Parse from YAML; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::serialization(format!("invalid botanist config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading botanist config");
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_with_context(
                "load_config",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        Self::from_yaml(&raw)
    }

    /// Check every step's budget before any step runs
    pub fn validate(&self) -> Result<()> {
        let steps = [
            ("kubeApiServerService", &self.kube_api_server_service),
            ("kubeApiServer", &self.kube_api_server),
            ("backupInfrastructure", &self.backup_infrastructure),
            ("vpnConnection", &self.vpn_connection),
            ("namespaceDeletion", &self.namespace_deletion),
            ("kubeAddonManagerDeletion", &self.kube_addon_manager_deletion),
        ];
        for (name, spec) in steps {
            spec.validate().map_err(|e| match e {
                Error::Validation { message, field } => Error::validation_for_field(
                    format!("{}.{}", name, field.unwrap_or_default()),
                    message,
                ),
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_budgets() {
        let cfg = BotanistConfig::default();
        assert_eq!(cfg.kube_api_server_service.timeout, Duration::from_secs(600));
        assert_eq!(cfg.kube_api_server.timeout, Duration::from_secs(300));
        assert_eq!(cfg.backup_infrastructure.timeout, Duration::from_secs(600));
        assert_eq!(cfg.vpn_connection.timeout, Duration::from_secs(900));
        assert_eq!(cfg.namespace_deletion.timeout, Duration::from_secs(900));
        assert_eq!(cfg.kube_addon_manager_deletion.timeout, Duration::from_secs(600));
        assert_eq!(cfg.kube_api_server.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(cfg.pod_readiness, PodReadinessPolicy::Any);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let cfg = BotanistConfig::from_yaml(
            "kubeApiServer:\n  interval: 2\n  timeout: 60\npodReadiness: all\n",
        )
        .unwrap();
        assert_eq!(
            cfg.kube_api_server,
            PollSpec::new(Duration::from_secs(2), Duration::from_secs(60))
        );
        assert_eq!(cfg.pod_readiness, PodReadinessPolicy::All);
        assert_eq!(cfg.vpn_connection.timeout, Duration::from_secs(900));
    }

    #[test]
    fn test_invalid_budget_names_the_step() {
        let err = BotanistConfig::from_yaml("vpnConnection:\n  interval: 30\n  timeout: 10\n")
            .unwrap_err();
        match err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("vpnConnection.interval"))
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_a_serialization_error() {
        let err = BotanistConfig::from_yaml("kubeApiServer: [").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = BotanistConfig::load(Path::new("/nonexistent/arbor.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/arbor.yaml"));
    }
}
