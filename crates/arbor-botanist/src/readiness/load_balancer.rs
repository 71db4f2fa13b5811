//! Load balancer ingress readiness for a control-plane Service

use k8s_openapi::api::core::v1::{LoadBalancerIngress, Service};

use arbor_common::Result;

use super::Readiness;

/// Address facts resolved once the load balancer has an ingress
#[derive(Clone, Debug, PartialEq)]
pub struct ApiServerEndpoint {
    /// Hostname or IP clients use to reach the API server
    pub address: String,
    /// Every ingress record from the Service status, in order
    pub ingresses: Vec<LoadBalancerIngress>,
}

/// Ready once the Service status lists an ingress with a hostname or IP.
///
/// Lookup failures, including a Service that does not exist yet, are never
/// terminal: the load balancer is provisioned asynchronously by the cloud
/// provider integration.
pub fn load_balancer_ready(observed: Result<Option<Service>>) -> Readiness<ApiServerEndpoint> {
    let service = match observed {
        Ok(Some(service)) => service,
        Ok(None) => return Readiness::waiting("service does not exist yet"),
        Err(e) => return Readiness::transient("looking up service", e),
    };

    let ingresses = service
        .status
        .and_then(|s| s.load_balancer)
        .and_then(|lb| lb.ingress)
        .unwrap_or_default();

    match resolve_address(&ingresses) {
        Some(address) => Readiness::Ready(ApiServerEndpoint { address, ingresses }),
        None => Readiness::waiting("load balancer has no ingress address yet"),
    }
}

/// First ingress entry with an address; hostnames win over IPs within an entry
fn resolve_address(ingresses: &[LoadBalancerIngress]) -> Option<String> {
    ingresses.iter().find_map(|ingress| {
        non_empty(ingress.hostname.as_deref()).or_else(|| non_empty(ingress.ip.as_deref()))
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
