//! Step sequencing for provisioning and decommissioning
//!
//! Steps of one operation run strictly one after another; later steps read
//! facts earlier ones committed. The first failing step aborts the rest of
//! the sequence. Nothing is rolled back.

use std::fmt;

use tracing::{error, info};

use arbor_common::{Error, Result};

use crate::botanist::Botanist;

/// One wait step, identified by a stable id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// kube-apiserver Service has a load balancer address
    KubeApiServerServiceReady,
    /// kube-apiserver pods are ready
    KubeApiServerReady,
    /// BackupInfrastructure reconciled successfully
    BackupInfrastructureReconciled,
    /// VPN tunnel into the Shoot is reachable
    VpnConnectionEstablished,
    /// kube-addon-manager deployment is gone
    KubeAddonManagerDeleted,
    /// Seed namespace is gone
    SeedNamespaceDeleted,
    /// Backup namespace is gone
    BackupNamespaceDeleted,
}

impl Step {
    /// Stable identifier used in logs and errors
    pub fn id(&self) -> &'static str {
        match self {
            Self::KubeApiServerServiceReady => "kube-apiserver-service-ready",
            Self::KubeApiServerReady => "kube-apiserver-ready",
            Self::BackupInfrastructureReconciled => "backup-infrastructure-reconciled",
            Self::VpnConnectionEstablished => "vpn-connection-established",
            Self::KubeAddonManagerDeleted => "kube-addon-manager-deleted",
            Self::SeedNamespaceDeleted => "seed-namespace-deleted",
            Self::BackupNamespaceDeleted => "backup-namespace-deleted",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Steps a sequence completed, in order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowReport {
    /// Completed steps
    pub completed: Vec<Step>,
}

impl Botanist {
    /// Run the provisioning waits: load balancer, kube-apiserver pods, backup
    /// infrastructure (when the Shoot has one), then the VPN tunnel.
    pub async fn provision(&mut self) -> Result<FlowReport> {
        let mut steps = vec![Step::KubeApiServerServiceReady, Step::KubeApiServerReady];
        if self.shoot().with_backup {
            steps.push(Step::BackupInfrastructureReconciled);
        }
        steps.push(Step::VpnConnectionEstablished);
        self.run_sequence("provision", &steps).await
    }

    /// Run the decommissioning waits: kube-addon-manager gone, seed namespace
    /// gone, then the backup namespace (when the Shoot has one).
    pub async fn decommission(&mut self) -> Result<FlowReport> {
        let mut steps = vec![Step::KubeAddonManagerDeleted, Step::SeedNamespaceDeleted];
        if self.shoot().with_backup {
            steps.push(Step::BackupNamespaceDeleted);
        }
        self.run_sequence("decommission", &steps).await
    }

    async fn run_sequence(&mut self, flow: &str, steps: &[Step]) -> Result<FlowReport> {
        let shoot = self.shoot().name.clone();
        let mut report = FlowReport::default();

        for &step in steps {
            info!(flow, shoot = %shoot, step = %step, "step started");
            if let Err(e) = self.run_step(step).await {
                error!(flow, shoot = %shoot, step = %step, error = %e, "step failed, aborting sequence");
                return Err(Error::step(step.id(), e));
            }
            info!(flow, shoot = %shoot, step = %step, "step finished");
            report.completed.push(step);
        }

        Ok(report)
    }

    async fn run_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::KubeApiServerServiceReady => self.wait_until_kube_apiserver_service_ready().await,
            Step::KubeApiServerReady => self.wait_until_kube_apiserver_ready().await,
            Step::BackupInfrastructureReconciled => {
                self.wait_until_backup_infrastructure_reconciled().await
            }
            Step::VpnConnectionEstablished => self.wait_until_vpn_connection_exists().await,
            Step::KubeAddonManagerDeleted => self.wait_until_kube_addon_manager_deleted().await,
            Step::SeedNamespaceDeleted => self.wait_until_seed_namespace_deleted().await,
            Step::BackupNamespaceDeleted => self.wait_until_backup_namespace_deleted().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{
        ContainerStatus, LoadBalancerIngress, LoadBalancerStatus, Namespace, Pod, PodStatus,
        Service, ServiceStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use arbor_common::crd::{
        BackupInfrastructure, BackupInfrastructureSpec, BackupInfrastructureStatus,
        LastOperation, LastOperationState,
    };

    use crate::accessor::{Endpoints, MockClusterReader};
    use crate::botanist::ShootContext;
    use crate::config::BotanistConfig;

    fn shoot(with_backup: bool) -> ShootContext {
        ShootContext {
            name: "alpha".to_string(),
            project_namespace: "garden-dev".to_string(),
            seed_namespace: "shoot--dev--alpha".to_string(),
            uid: "1234".to_string(),
            with_backup,
        }
    }

    fn botanist(
        with_backup: bool,
        seed: MockClusterReader,
        shoot_reader: MockClusterReader,
        garden: MockClusterReader,
        cancel: CancellationToken,
    ) -> Botanist {
        Botanist::new(
            shoot(with_backup),
            Endpoints::new(Arc::new(seed), Arc::new(shoot_reader), Arc::new(garden)),
            BotanistConfig::default(),
            cancel,
        )
        .unwrap()
    }

    fn lb_service() -> Service {
        Service {
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![LoadBalancerIngress {
                        ip: Some("203.0.113.10".to_string()),
                        ..Default::default()
                    }]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn apiserver_pod() -> Pod {
        Pod {
            status: Some(PodStatus {
                container_statuses: Some(vec![ContainerStatus {
                    name: "kube-apiserver".to_string(),
                    ready: true,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn vpn_pod() -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("vpn-shoot-0".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn reconciled_backup() -> BackupInfrastructure {
        let mut infra = BackupInfrastructure::new(
            "shoot--dev--alpha--1234",
            BackupInfrastructureSpec {
                seed: "aws".to_string(),
                shoot_uid: "1234".to_string(),
            },
        );
        infra.status = Some(BackupInfrastructureStatus {
            last_operation: Some(LastOperation {
                state: LastOperationState::Succeeded,
                progress: 100,
                ..Default::default()
            }),
            ..Default::default()
        });
        infra
    }

    /// Readers that record each call into a shared journal
    fn journaled_readers(
        journal: Arc<Mutex<Vec<&'static str>>>,
    ) -> (MockClusterReader, MockClusterReader, MockClusterReader) {
        let mut seed = MockClusterReader::new();
        let j = journal.clone();
        seed.expect_get_service().returning(move |_, _| {
            j.lock().unwrap().push("service");
            Ok(Some(lb_service()))
        });
        let j = journal.clone();
        seed.expect_list_pods().returning(move |_, _| {
            j.lock().unwrap().push("apiserver-pods");
            Ok(vec![apiserver_pod()])
        });

        let mut garden = MockClusterReader::new();
        let j = journal.clone();
        garden.expect_get_backup_infrastructure().returning(move |_, _| {
            j.lock().unwrap().push("backup");
            Ok(Some(reconciled_backup()))
        });

        let mut shoot_reader = MockClusterReader::new();
        let j = journal.clone();
        shoot_reader.expect_list_pods().returning(move |_, _| {
            j.lock().unwrap().push("vpn-pods");
            Ok(vec![vpn_pod()])
        });
        let j = journal;
        shoot_reader.expect_probe_pod_port().returning(move |_, _, _| {
            j.lock().unwrap().push("vpn-probe");
            Ok(true)
        });

        (seed, shoot_reader, garden)
    }

    // ==========================================================================
    // Story: provisioning a Shoot
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_provision_runs_steps_in_order_and_records_address() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (seed, shoot_reader, garden) = journaled_readers(journal.clone());
        let mut b = botanist(true, seed, shoot_reader, garden, CancellationToken::new());

        let report = b.provision().await.unwrap();

        assert_eq!(
            report.completed,
            vec![
                Step::KubeApiServerServiceReady,
                Step::KubeApiServerReady,
                Step::BackupInfrastructureReconciled,
                Step::VpnConnectionEstablished,
            ]
        );
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["service", "apiserver-pods", "backup", "vpn-pods", "vpn-probe"]
        );
        assert_eq!(b.state().api_server_address().unwrap(), "203.0.113.10");
    }

    #[tokio::test(start_paused = true)]
    async fn story_provision_without_backup_skips_the_garden() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (seed, shoot_reader, _) = journaled_readers(journal.clone());
        // A garden reader with no expectations panics if it is ever called
        let mut b = botanist(
            false,
            seed,
            shoot_reader,
            MockClusterReader::new(),
            CancellationToken::new(),
        );

        let report = b.provision().await.unwrap();

        assert!(!report.completed.contains(&Step::BackupInfrastructureReconciled));
        assert_eq!(report.completed.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn story_failed_step_aborts_the_rest() {
        let mut seed = MockClusterReader::new();
        seed.expect_get_service().returning(|_, _| Ok(Some(lb_service())));
        // Pods never become ready
        seed.expect_list_pods().returning(|_, _| Ok(vec![]));
        // Nothing after the pods step may run
        let shoot_reader = MockClusterReader::new();
        let garden = MockClusterReader::new();
        let mut b = botanist(true, seed, shoot_reader, garden, CancellationToken::new());

        let start = Instant::now();
        let err = b.provision().await.unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert_eq!(err.failed_step(), Some("kube-apiserver-ready"));
        assert!(err.root_cause().is_timeout());
        assert!(err
            .to_string()
            .contains("no pods have been created yet"));
        // The fact committed before the failure survives
        assert_eq!(b.state().api_server_address().unwrap(), "203.0.113.10");
    }

    #[tokio::test(start_paused = true)]
    async fn story_cancellation_is_reported_as_cancellation() {
        let cancel = CancellationToken::new();
        let mut seed = MockClusterReader::new();
        seed.expect_get_service().returning(|_, _| Ok(Some(Service::default())));
        let mut b = botanist(
            false,
            seed,
            MockClusterReader::new(),
            MockClusterReader::new(),
            cancel.clone(),
        );

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        let err = b.provision().await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(12));
        assert_eq!(err.failed_step(), Some("kube-apiserver-service-ready"));
        assert!(err.root_cause().is_cancelled());
        assert!(!err.root_cause().is_timeout());
    }

    // ==========================================================================
    // Story: decommissioning a Shoot
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_decommission_waits_for_everything_to_disappear() {
        let journal: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut seed = MockClusterReader::new();

        let j = journal.clone();
        let mut addon_lookups = 0;
        seed.expect_get_deployment().returning(move |_, name| {
            j.lock().unwrap().push(format!("deployment/{}", name));
            addon_lookups += 1;
            Ok((addon_lookups < 3).then(Deployment::default))
        });
        let j = journal.clone();
        seed.expect_get_namespace().returning(move |name| {
            j.lock().unwrap().push(format!("namespace/{}", name));
            Ok(None)
        });

        let mut b = botanist(
            true,
            seed,
            MockClusterReader::new(),
            MockClusterReader::new(),
            CancellationToken::new(),
        );

        let start = Instant::now();
        let report = b.decommission().await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(
            report.completed,
            vec![
                Step::KubeAddonManagerDeleted,
                Step::SeedNamespaceDeleted,
                Step::BackupNamespaceDeleted,
            ]
        );
        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "deployment/kube-addon-manager",
                "deployment/kube-addon-manager",
                "deployment/kube-addon-manager",
                "namespace/shoot--dev--alpha",
                "namespace/backup--shoot--dev--alpha--1234",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn story_decommission_surfaces_lookup_errors() {
        let mut seed = MockClusterReader::new();
        seed.expect_get_deployment().returning(|_, _| Ok(None));
        let mut namespace_lookups = 0;
        seed.expect_get_namespace().times(2).returning(move |_| {
            namespace_lookups += 1;
            if namespace_lookups == 1 {
                Ok(Some(Namespace::default()))
            } else {
                Err(Error::internal_with_context("get_namespace", "forbidden"))
            }
        });
        let mut b = botanist(
            false,
            seed,
            MockClusterReader::new(),
            MockClusterReader::new(),
            CancellationToken::new(),
        );

        let start = Instant::now();
        let err = b.decommission().await.unwrap_err();

        // The error ends the wait on the tick it is seen, not at the deadline
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(err.failed_step(), Some("seed-namespace-deleted"));
        assert!(!err.root_cause().is_timeout());
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn test_step_ids_are_stable() {
        assert_eq!(Step::KubeApiServerServiceReady.to_string(), "kube-apiserver-service-ready");
        assert_eq!(Step::VpnConnectionEstablished.id(), "vpn-connection-established");
        assert_eq!(Step::BackupNamespaceDeleted.id(), "backup-namespace-deleted");
    }
}
