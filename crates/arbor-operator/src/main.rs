//! arbor operator - readiness waits for one Shoot's lifecycle operation

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kube::CustomResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use arbor_botanist::{Botanist, BotanistConfig, EndpointKubeconfigs, Endpoints, ShootContext};
use arbor_common::crd::BackupInfrastructure;
use arbor_common::telemetry::{init_telemetry, shutdown_telemetry, LogFormat, TelemetryConfig};

/// arbor - waits for Shoot control planes to come up or go away
#[derive(Parser, Debug)]
#[command(name = "arbor-operator", version, about, long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, env = "ARBOR_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Json, global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wait until a freshly deployed Shoot control plane is reachable
    ///
    /// Runs, in order: kube-apiserver load balancer, kube-apiserver pods,
    /// backup infrastructure (with --with-backup), VPN tunnel. Prints the
    /// API server address on success.
    Provision(RunArgs),
    /// Wait until a deleted Shoot control plane is gone from the Seed
    ///
    /// Runs, in order: kube-addon-manager deployment, seed namespace, backup
    /// namespace (with --with-backup).
    Decommission(RunArgs),
    /// Print the BackupInfrastructure CRD manifest and exit
    Crd,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Json,
    Text,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Text => LogFormat::Text,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    shoot: ShootArgs,

    #[command(flatten)]
    kubeconfigs: KubeconfigArgs,

    /// YAML file overriding poll budgets and the pod readiness policy
    #[arg(long, env = "ARBOR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ShootArgs {
    /// Shoot name
    #[arg(long, env = "ARBOR_SHOOT_NAME")]
    shoot_name: String,

    /// Garden project namespace of the Shoot
    #[arg(long, env = "ARBOR_SHOOT_NAMESPACE")]
    shoot_namespace: String,

    /// Namespace in the Seed that hosts the Shoot's control plane
    #[arg(long, env = "ARBOR_SEED_NAMESPACE")]
    seed_namespace: String,

    /// UID of the Shoot object
    #[arg(long, env = "ARBOR_SHOOT_UID")]
    shoot_uid: String,

    /// The Shoot has a BackupInfrastructure record and backup namespace
    #[arg(long, env = "ARBOR_WITH_BACKUP")]
    with_backup: bool,
}

impl From<ShootArgs> for ShootContext {
    fn from(args: ShootArgs) -> Self {
        ShootContext {
            name: args.shoot_name,
            project_namespace: args.shoot_namespace,
            seed_namespace: args.seed_namespace,
            uid: args.shoot_uid,
            with_backup: args.with_backup,
        }
    }
}

#[derive(Args, Debug)]
struct KubeconfigArgs {
    /// Kubeconfig for the Seed cluster (inferred when absent)
    #[arg(long, env = "ARBOR_SEED_KUBECONFIG")]
    seed_kubeconfig: Option<PathBuf>,

    /// Kubeconfig for the Shoot cluster (inferred when absent)
    #[arg(long, env = "ARBOR_SHOOT_KUBECONFIG")]
    shoot_kubeconfig: Option<PathBuf>,

    /// Kubeconfig for the Garden cluster (inferred when absent)
    #[arg(long, env = "ARBOR_GARDEN_KUBECONFIG")]
    garden_kubeconfig: Option<PathBuf>,
}

impl From<KubeconfigArgs> for EndpointKubeconfigs {
    fn from(args: KubeconfigArgs) -> Self {
        EndpointKubeconfigs {
            seed: args.seed_kubeconfig,
            shoot: args.shoot_kubeconfig,
            garden: args.garden_kubeconfig,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    Provision,
    Decommission,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (direction, args) = match cli.command {
        Commands::Crd => {
            let crd = serde_yaml::to_string(&BackupInfrastructure::crd())
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("{crd}");
            return Ok(());
        }
        Commands::Provision(args) => (Direction::Provision, args),
        Commands::Decommission(args) => (Direction::Decommission, args),
    };

    init_telemetry(TelemetryConfig {
        service_name: "arbor-operator".to_string(),
        log_format: cli.log_format.into(),
        ..Default::default()
    })?;

    let result = run(direction, args).await;
    if let Err(e) = &result {
        error!(error = %e, "operation failed");
    }
    shutdown_telemetry();
    result
}

async fn run(direction: Direction, args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => BotanistConfig::load(path)?,
        None => BotanistConfig::default(),
    };
    let shoot: ShootContext = args.shoot.into();
    let kubeconfigs: EndpointKubeconfigs = args.kubeconfigs.into();
    let endpoints = Endpoints::connect(&kubeconfigs).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling current step");
                cancel.cancel();
            }
        }
    });

    info!(
        shoot = %shoot.name,
        project = %shoot.project_namespace,
        seed_namespace = %shoot.seed_namespace,
        ?direction,
        "starting"
    );
    let mut botanist = Botanist::new(shoot, endpoints, config, cancel)?;

    match direction {
        Direction::Provision => {
            let report = botanist.provision().await?;
            let address = botanist.state().api_server_address()?;
            info!(steps = report.completed.len(), address, "shoot control plane is ready");
            println!("{address}");
        }
        Direction::Decommission => {
            let report = botanist.decommission().await?;
            info!(steps = report.completed.len(), "shoot control plane is gone");
        }
    }
    Ok(())
}
