//! Shared Kubernetes utilities using kube-rs
//!
//! Client construction for the Seed, Shoot and Garden endpoints.

use std::path::Path;
use std::time::Duration;

use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
///
/// Without a path the configuration is inferred (in-cluster service account,
/// then `KUBECONFIG` / `~/.kube/config`).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            debug!(path = %path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig {}: {}", path.display(), e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// List parameters restricted to a label selector
pub fn label_selector_params(selector: &str) -> ListParams {
    ListParams::default().labels(selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_params() {
        let params = label_selector_params("app=vpn-shoot");
        assert_eq!(params.label_selector.as_deref(), Some("app=vpn-shoot"));
    }

    #[test]
    fn test_default_timeouts() {
        assert!(DEFAULT_CONNECT_TIMEOUT < DEFAULT_READ_TIMEOUT);
    }

    #[tokio::test]
    async fn test_create_client_missing_kubeconfig() {
        let Err(err) = create_client(Some(Path::new("/nonexistent/arbor/kubeconfig"))).await else {
            panic!("Expected error for missing kubeconfig");
        };
        assert_eq!(err.context(), Some("create_client"));
        assert!(err.to_string().contains("failed to read kubeconfig"));
    }
}
