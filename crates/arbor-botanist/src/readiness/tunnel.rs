//! Network tunnel reachability
//!
//! The tunnel is reachable when a running tunnel pod exists in the Shoot and a
//! port-forward through it can be established. Neither half ever fails the
//! step; both are retried until the step's deadline.

use k8s_openapi::api::core::v1::Pod;

use arbor_common::Result;

use super::Readiness;

const POD_PHASE_RUNNING: &str = "Running";

/// Ready with the name of the first pod in phase `Running`
///
/// A pod without a name cannot be port-forwarded to and is skipped.
pub fn running_pod(observed: Result<Vec<Pod>>) -> Readiness<String> {
    let pods = match observed {
        Ok(pods) => pods,
        Err(e) => return Readiness::transient("listing tunnel pods", e),
    };

    pods.into_iter()
        .filter(|p| {
            p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(POD_PHASE_RUNNING)
        })
        .find_map(|p| p.metadata.name.filter(|name| !name.is_empty()))
        .map(Readiness::Ready)
        .unwrap_or_else(|| Readiness::waiting("no running tunnel pod yet"))
}

/// Ready when the forwarded probe through the tunnel pod succeeded
pub fn tunnel_probe(probe: Result<bool>) -> Readiness {
    match probe {
        Ok(true) => Readiness::Ready(()),
        Ok(false) => Readiness::waiting("port-forward through tunnel pod not established yet"),
        Err(e) => Readiness::transient("probing tunnel pod", e),
    }
}
