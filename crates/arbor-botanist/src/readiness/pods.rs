//! Pod-set readiness for control-plane components

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

use arbor_common::Result;

use super::Readiness;

/// How readiness of the individual pods combines into readiness of the set
///
/// Only pods without a deletion timestamp are considered; terminating
/// replicas of a rolling update never count for or against the set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodReadinessPolicy {
    /// At least one eligible pod is ready
    #[default]
    Any,
    /// Every eligible pod is ready (and there is at least one)
    All,
}

/// Ready when the eligible pods satisfy `policy` for the named container.
///
/// A pod is ready when its status lists `container` as ready. List errors are
/// retried like a missing deployment.
pub fn pods_ready(
    observed: Result<Vec<Pod>>,
    container: &str,
    policy: PodReadinessPolicy,
) -> Readiness {
    let pods = match observed {
        Ok(pods) => pods,
        Err(e) => return Readiness::transient("listing pods", e),
    };

    if pods.is_empty() {
        return Readiness::waiting("no pods have been created yet");
    }

    let eligible: Vec<&Pod> = pods
        .iter()
        .filter(|p| p.metadata.deletion_timestamp.is_none())
        .collect();
    if eligible.is_empty() {
        return Readiness::waiting("all pods are terminating");
    }

    let ready = eligible
        .iter()
        .filter(|p| container_ready(p, container))
        .count();

    let satisfied = match policy {
        PodReadinessPolicy::Any => ready > 0,
        PodReadinessPolicy::All => ready == eligible.len(),
    };

    if satisfied {
        Readiness::Ready(())
    } else {
        Readiness::waiting(format!(
            "{}/{} pods have a ready {} container",
            ready,
            eligible.len(),
            container
        ))
    }
}

fn container_ready(pod: &Pod, container: &str) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .any(|cs| cs.name == container && cs.ready)
        })
        .unwrap_or(false)
}
