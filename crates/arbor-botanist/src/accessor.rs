//! Multi-endpoint resource accessor
//!
//! A Shoot operation reads from up to three clusters: the Seed hosting the
//! control plane, the Shoot itself and the Garden holding the declarative
//! records. Each endpoint gets its own [`ClusterReader`] built from its own
//! credentials; nothing here assumes two endpoints share a cluster, a
//! namespace or RBAC scope.
//!
//! Readers never cache. Every call goes to the API server so each poll tick
//! observes live state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::api::Api;
use kube::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

use arbor_common::crd::BackupInfrastructure;
use arbor_common::kube_utils::{create_client, label_selector_params};
use arbor_common::Result;

/// Which cluster a read is directed at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Cluster hosting the Shoot's control plane
    Seed,
    /// The managed cluster itself
    Shoot,
    /// Cluster holding Gardener's declarative records
    Garden,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seed => write!(f, "seed"),
            Self::Shoot => write!(f, "shoot"),
            Self::Garden => write!(f, "garden"),
        }
    }
}

/// Kinds of objects the readiness steps look at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// core/v1 Service
    Service,
    /// core/v1 Pod
    Pod,
    /// core/v1 Namespace
    Namespace,
    /// apps/v1 Deployment
    Deployment,
    /// garden.sapcloud.io/v1beta1 BackupInfrastructure
    BackupInfrastructure,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Pod => write!(f, "pods"),
            Self::Namespace => write!(f, "namespace"),
            Self::Deployment => write!(f, "deployment"),
            Self::BackupInfrastructure => write!(f, "backupinfrastructure"),
        }
    }
}

/// Identifies the object (or set of objects) a wait step observes.
///
/// Rendered with [`fmt::Display`] it is the operation description used in
/// logs and timeout errors, e.g. `seed service shoot--dev--alpha/kube-apiserver`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    /// Cluster the object lives in
    pub endpoint: Endpoint,
    /// Object kind
    pub kind: ResourceKind,
    /// Namespace for namespaced kinds
    pub namespace: Option<String>,
    /// Object name, absent for selector-based lookups
    pub name: Option<String>,
    /// Label selector for list lookups
    pub selector: Option<String>,
}

impl ResourceRef {
    /// A single namespaced object
    pub fn named(
        endpoint: Endpoint,
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            kind,
            namespace: Some(namespace.into()),
            name: Some(name.into()),
            selector: None,
        }
    }

    /// A single cluster-scoped object
    pub fn cluster_scoped(endpoint: Endpoint, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            endpoint,
            kind,
            namespace: None,
            name: Some(name.into()),
            selector: None,
        }
    }

    /// Every object in `namespace` matching a label selector
    pub fn selected(
        endpoint: Endpoint,
        kind: ResourceKind,
        namespace: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            kind,
            namespace: Some(namespace.into()),
            name: None,
            selector: Some(selector.into()),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.endpoint, self.kind)?;
        match (&self.namespace, &self.name, &self.selector) {
            (Some(ns), Some(name), _) => write!(f, "{}/{}", ns, name),
            (None, Some(name), _) => write!(f, "{}", name),
            (Some(ns), None, Some(sel)) => write!(f, "{} ({})", ns, sel),
            (None, None, Some(sel)) => write!(f, "({})", sel),
            (Some(ns), None, None) => write!(f, "{}", ns),
            (None, None, None) => write!(f, "*"),
        }
    }
}

/// Read-only access to one cluster endpoint
///
/// Getters return `Ok(None)` when the API server answers not-found; every
/// other failure is returned as an error for the predicate to classify.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Get a Service
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    /// List pods in `namespace` matching `selector`
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>>;

    /// Get a Namespace
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    /// Get a Deployment
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>>;

    /// Get a BackupInfrastructure record
    async fn get_backup_infrastructure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupInfrastructure>>;

    /// Open a port-forward to `port` of `pod` and report whether the stream
    /// could be established. The forward is torn down before returning.
    async fn probe_pod_port(&self, namespace: &str, pod: &str, port: u16) -> Result<bool>;
}

/// [`ClusterReader`] backed by a live kube client
pub struct KubeClusterReader {
    endpoint: Endpoint,
    client: Client,
}

impl KubeClusterReader {
    /// Wrap a client for `endpoint`
    pub fn new(endpoint: Endpoint, client: Client) -> Self {
        Self { endpoint, client }
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        trace!(endpoint = %self.endpoint, namespace, name, "get service");
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        trace!(endpoint = %self.endpoint, namespace, selector, "list pods");
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&label_selector_params(selector)).await?;
        Ok(pods.items)
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        trace!(endpoint = %self.endpoint, name, "get namespace");
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        trace!(endpoint = %self.endpoint, namespace, name, "get deployment");
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_backup_infrastructure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BackupInfrastructure>> {
        trace!(endpoint = %self.endpoint, namespace, name, "get backupinfrastructure");
        let api: Api<BackupInfrastructure> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn probe_pod_port(&self, namespace: &str, pod: &str, port: u16) -> Result<bool> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let mut forwarder = api.portforward(pod, &[port]).await?;
        let established = forwarder.take_stream(port).is_some();
        forwarder.abort();
        debug!(endpoint = %self.endpoint, namespace, pod, port, established, "port-forward probe");
        Ok(established)
    }
}

/// Kubeconfig locations for each endpoint
///
/// A missing path falls back to kube's inferred configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointKubeconfigs {
    /// Kubeconfig for the Seed cluster
    #[serde(default)]
    pub seed: Option<PathBuf>,
    /// Kubeconfig for the Shoot cluster
    #[serde(default)]
    pub shoot: Option<PathBuf>,
    /// Kubeconfig for the Garden cluster
    #[serde(default)]
    pub garden: Option<PathBuf>,
}

/// The reader bundle for one Shoot operation
#[derive(Clone)]
pub struct Endpoints {
    seed: Arc<dyn ClusterReader>,
    shoot: Arc<dyn ClusterReader>,
    garden: Arc<dyn ClusterReader>,
}

impl Endpoints {
    /// Bundle already-constructed readers
    pub fn new(
        seed: Arc<dyn ClusterReader>,
        shoot: Arc<dyn ClusterReader>,
        garden: Arc<dyn ClusterReader>,
    ) -> Self {
        Self {
            seed,
            shoot,
            garden,
        }
    }

    /// Build one kube-backed reader per endpoint from its own kubeconfig
    pub async fn connect(kubeconfigs: &EndpointKubeconfigs) -> Result<Self> {
        let seed = create_client(kubeconfigs.seed.as_deref()).await?;
        let shoot = create_client(kubeconfigs.shoot.as_deref()).await?;
        let garden = create_client(kubeconfigs.garden.as_deref()).await?;
        Ok(Self::new(
            Arc::new(KubeClusterReader::new(Endpoint::Seed, seed)),
            Arc::new(KubeClusterReader::new(Endpoint::Shoot, shoot)),
            Arc::new(KubeClusterReader::new(Endpoint::Garden, garden)),
        ))
    }

    /// The reader for `endpoint`
    pub fn reader(&self, endpoint: Endpoint) -> &dyn ClusterReader {
        match endpoint {
            Endpoint::Seed => self.seed.as_ref(),
            Endpoint::Shoot => self.shoot.as_ref(),
            Endpoint::Garden => self.garden.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ref_renders_as_operation_text() {
        let svc = ResourceRef::named(
            Endpoint::Seed,
            ResourceKind::Service,
            "shoot--dev--alpha",
            "kube-apiserver",
        );
        assert_eq!(svc.to_string(), "seed service shoot--dev--alpha/kube-apiserver");

        let ns = ResourceRef::cluster_scoped(Endpoint::Seed, ResourceKind::Namespace, "shoot--x");
        assert_eq!(ns.to_string(), "seed namespace shoot--x");

        let pods = ResourceRef::selected(
            Endpoint::Shoot,
            ResourceKind::Pod,
            "kube-system",
            "app=vpn-shoot",
        );
        assert_eq!(pods.to_string(), "shoot pods kube-system (app=vpn-shoot)");
    }

    #[tokio::test]
    async fn test_reader_routes_to_its_own_endpoint() {
        let mut seed = MockClusterReader::new();
        seed.expect_get_namespace()
            .returning(|_| Ok(Some(Namespace::default())));
        let mut shoot = MockClusterReader::new();
        shoot.expect_get_namespace().returning(|_| Ok(None));
        let garden = MockClusterReader::new();

        let endpoints = Endpoints::new(Arc::new(seed), Arc::new(shoot), Arc::new(garden));

        assert!(endpoints
            .reader(Endpoint::Seed)
            .get_namespace("a")
            .await
            .unwrap()
            .is_some());
        assert!(endpoints
            .reader(Endpoint::Shoot)
            .get_namespace("a")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_kubeconfigs_deserialize_partially() {
        let cfg: EndpointKubeconfigs = serde_yaml::from_str("seed: /etc/seed.yaml\n").unwrap();
        assert_eq!(cfg.seed, Some(PathBuf::from("/etc/seed.yaml")));
        assert!(cfg.shoot.is_none());
        assert!(cfg.garden.is_none());
    }
}
