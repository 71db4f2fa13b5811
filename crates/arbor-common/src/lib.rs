//! Common types for arbor: errors, custom resources, and Kubernetes utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod names;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Name of the kube-apiserver Service, Deployment and container in the Seed
pub const KUBE_APISERVER_DEPLOYMENT_NAME: &str = "kube-apiserver";

/// Name of the kube-addon-manager Deployment in the Seed
pub const KUBE_ADDON_MANAGER_DEPLOYMENT_NAME: &str = "kube-addon-manager";

/// Namespace holding system components inside a Shoot
pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";

/// Label selector matching kube-apiserver pods in a Shoot's Seed namespace
pub const KUBE_APISERVER_LABEL_SELECTOR: &str = "app=kubernetes,role=apiserver";

/// Label selector matching the vpn-shoot pods in the Shoot's kube-system namespace
pub const VPN_SHOOT_LABEL_SELECTOR: &str = "app=vpn-shoot";

/// Port the vpn-shoot pod exposes for the tunnel probe (sshd)
pub const VPN_SHOOT_PROBE_PORT: u16 = 22;

/// Prefix of namespaces that hold the backup of a Shoot's state in the Seed
pub const BACKUP_NAMESPACE_PREFIX: &str = "backup";
