//! Wait steps for one Shoot operation
//!
//! A [`Botanist`] owns everything a single provisioning or decommissioning run
//! needs: the Shoot's identity, the endpoint readers, the poll budgets, the
//! operation state and the cancellation token. Each `wait_until_*` method is
//! one step; [`crate::flow`] orders them.

use tokio_util::sync::CancellationToken;
use tracing::info;

use arbor_common::names::{backup_infrastructure_name, backup_namespace_name};
use arbor_common::{
    Result, KUBE_ADDON_MANAGER_DEPLOYMENT_NAME, KUBE_APISERVER_DEPLOYMENT_NAME,
    KUBE_APISERVER_LABEL_SELECTOR, KUBE_SYSTEM_NAMESPACE, VPN_SHOOT_LABEL_SELECTOR,
    VPN_SHOOT_PROBE_PORT,
};

use crate::accessor::{Endpoint, Endpoints, ResourceKind, ResourceRef};
use crate::config::BotanistConfig;
use crate::poll::poll_until;
use crate::readiness::{
    backup_infrastructure_reconciled, load_balancer_ready, pods_ready, resource_removed,
    running_pod, tunnel_probe, Readiness,
};
use crate::state::{Commit, OperationState};

/// Identity of the Shoot an operation works on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShootContext {
    /// Shoot name
    pub name: String,
    /// Garden project namespace holding the Shoot
    pub project_namespace: String,
    /// Namespace in the Seed hosting the control plane
    pub seed_namespace: String,
    /// Shoot object UID
    pub uid: String,
    /// Whether the Shoot has a BackupInfrastructure record
    pub with_backup: bool,
}

impl ShootContext {
    /// Name of the Shoot's BackupInfrastructure record, if it has one
    pub fn backup_infrastructure_name(&self) -> Option<String> {
        self.with_backup
            .then(|| backup_infrastructure_name(&self.seed_namespace, &self.uid))
    }
}

/// Runs the wait steps for one Shoot
pub struct Botanist {
    shoot: ShootContext,
    endpoints: Endpoints,
    config: BotanistConfig,
    state: OperationState,
    cancel: CancellationToken,
}

impl Botanist {
    /// Create a botanist for `shoot`.
    ///
    /// Fails if any configured poll budget is invalid, before any step runs.
    pub fn new(
        shoot: ShootContext,
        endpoints: Endpoints,
        config: BotanistConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shoot,
            endpoints,
            config,
            state: OperationState::new(),
            cancel,
        })
    }

    /// The Shoot this botanist works on
    pub fn shoot(&self) -> &ShootContext {
        &self.shoot
    }

    /// Facts committed so far
    pub fn state(&self) -> &OperationState {
        &self.state
    }

    /// Token that aborts the current step when cancelled
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until the kube-apiserver Service in the Seed has a load balancer
    /// address, then commit the address and ingress records.
    pub async fn wait_until_kube_apiserver_service_ready(&mut self) -> Result<()> {
        let target = ResourceRef::named(
            Endpoint::Seed,
            ResourceKind::Service,
            &self.shoot.seed_namespace,
            KUBE_APISERVER_DEPLOYMENT_NAME,
        );
        let reader = self.endpoints.reader(Endpoint::Seed);
        let namespace = self.shoot.seed_namespace.as_str();

        let endpoint = poll_until(
            self.config.kube_api_server_service,
            &self.cancel,
            &target.to_string(),
            move || async move {
                load_balancer_ready(
                    reader
                        .get_service(namespace, KUBE_APISERVER_DEPLOYMENT_NAME)
                        .await,
                )
            },
        )
        .await?;

        let address = endpoint.address.clone();
        if self.state.commit_api_server(endpoint) == Commit::Committed {
            info!(shoot = %self.shoot.name, address = %address, "kube-apiserver load balancer is ready");
        }
        Ok(())
    }

    /// Wait until the kube-apiserver pods in the Seed report a ready
    /// `kube-apiserver` container, per the configured policy.
    pub async fn wait_until_kube_apiserver_ready(&self) -> Result<()> {
        let target = ResourceRef::selected(
            Endpoint::Seed,
            ResourceKind::Pod,
            &self.shoot.seed_namespace,
            KUBE_APISERVER_LABEL_SELECTOR,
        );
        let reader = self.endpoints.reader(Endpoint::Seed);
        let namespace = self.shoot.seed_namespace.as_str();
        let policy = self.config.pod_readiness;

        poll_until(
            self.config.kube_api_server,
            &self.cancel,
            &target.to_string(),
            move || async move {
                pods_ready(
                    reader
                        .list_pods(namespace, KUBE_APISERVER_LABEL_SELECTOR)
                        .await,
                    KUBE_APISERVER_DEPLOYMENT_NAME,
                    policy,
                )
            },
        )
        .await
    }

    /// Wait until the Shoot's BackupInfrastructure in the Garden reports a
    /// successful last operation. Shoots without backup return immediately.
    pub async fn wait_until_backup_infrastructure_reconciled(&self) -> Result<()> {
        let Some(name) = self.shoot.backup_infrastructure_name() else {
            return Ok(());
        };
        let target = ResourceRef::named(
            Endpoint::Garden,
            ResourceKind::BackupInfrastructure,
            &self.shoot.project_namespace,
            &name,
        );
        let reader = self.endpoints.reader(Endpoint::Garden);
        let namespace = self.shoot.project_namespace.as_str();
        let name = name.as_str();

        poll_until(
            self.config.backup_infrastructure,
            &self.cancel,
            &target.to_string(),
            move || async move {
                backup_infrastructure_reconciled(
                    reader.get_backup_infrastructure(namespace, name).await,
                )
            },
        )
        .await
    }

    /// Wait until a running vpn-shoot pod exists in the Shoot and a
    /// port-forward to it can be opened.
    pub async fn wait_until_vpn_connection_exists(&self) -> Result<()> {
        let target = ResourceRef::selected(
            Endpoint::Shoot,
            ResourceKind::Pod,
            KUBE_SYSTEM_NAMESPACE,
            VPN_SHOOT_LABEL_SELECTOR,
        );
        let reader = self.endpoints.reader(Endpoint::Shoot);

        poll_until(
            self.config.vpn_connection,
            &self.cancel,
            &target.to_string(),
            move || async move {
                let pod_name = match running_pod(
                    reader
                        .list_pods(KUBE_SYSTEM_NAMESPACE, VPN_SHOOT_LABEL_SELECTOR)
                        .await,
                ) {
                    Readiness::Ready(name) => name,
                    not_ready => return not_ready.map(|_| ()),
                };
                tunnel_probe(
                    reader
                        .probe_pod_port(KUBE_SYSTEM_NAMESPACE, &pod_name, VPN_SHOOT_PROBE_PORT)
                        .await,
                )
            },
        )
        .await
    }

    /// Wait until the Shoot's control-plane namespace is gone from the Seed
    pub async fn wait_until_seed_namespace_deleted(&self) -> Result<()> {
        self.wait_until_namespace_deleted(&self.shoot.seed_namespace)
            .await
    }

    /// Wait until the Shoot's backup namespace is gone from the Seed. Shoots
    /// without backup return immediately.
    pub async fn wait_until_backup_namespace_deleted(&self) -> Result<()> {
        let Some(infra) = self.shoot.backup_infrastructure_name() else {
            return Ok(());
        };
        self.wait_until_namespace_deleted(&backup_namespace_name(&infra))
            .await
    }

    async fn wait_until_namespace_deleted(&self, namespace: &str) -> Result<()> {
        let target =
            ResourceRef::cluster_scoped(Endpoint::Seed, ResourceKind::Namespace, namespace);
        let what = target.to_string();
        let reader = self.endpoints.reader(Endpoint::Seed);
        let what_ref = what.as_str();

        poll_until(
            self.config.namespace_deletion,
            &self.cancel,
            &what,
            move || async move { resource_removed(reader.get_namespace(namespace).await, what_ref) },
        )
        .await
    }

    /// Wait until the kube-addon-manager deployment is gone from the Seed
    pub async fn wait_until_kube_addon_manager_deleted(&self) -> Result<()> {
        let target = ResourceRef::named(
            Endpoint::Seed,
            ResourceKind::Deployment,
            &self.shoot.seed_namespace,
            KUBE_ADDON_MANAGER_DEPLOYMENT_NAME,
        );
        let what = target.to_string();
        let reader = self.endpoints.reader(Endpoint::Seed);
        let namespace = self.shoot.seed_namespace.as_str();
        let what_ref = what.as_str();

        poll_until(
            self.config.kube_addon_manager_deletion,
            &self.cancel,
            &what,
            move || async move {
                resource_removed(
                    reader
                        .get_deployment(namespace, KUBE_ADDON_MANAGER_DEPLOYMENT_NAME)
                        .await,
                    what_ref,
                )
            },
        )
        .await
    }
}
