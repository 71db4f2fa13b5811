//! Orchestration state carried between the steps of one operation
//!
//! Facts are verified by a step and then read by the steps after it. Each
//! fact is written at most once; re-running a step never overwrites what an
//! earlier run already verified.

use k8s_openapi::api::core::v1::LoadBalancerIngress;
use tracing::warn;

use arbor_common::{Error, Result};

use crate::readiness::ApiServerEndpoint;

/// Result of committing a fact
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    /// The fact was unset and now holds the value
    Committed,
    /// The fact was already set; the offered value was discarded
    AlreadySet,
}

/// A value that can be set once
#[derive(Clone, Debug)]
pub struct Fact<T> {
    value: Option<T>,
}

impl<T> Default for Fact<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: PartialEq> Fact<T> {
    /// Set the value unless one is already present
    pub fn commit(&mut self, value: T) -> (Commit, bool) {
        match &self.value {
            Some(existing) => (Commit::AlreadySet, *existing != value),
            None => {
                self.value = Some(value);
                (Commit::Committed, false)
            }
        }
    }

    /// The committed value, if any
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// Facts accumulated over one provisioning or decommissioning run
///
/// Owned by a single [`Botanist`](crate::Botanist); never shared between
/// operations on different Shoots.
#[derive(Clone, Debug, Default)]
pub struct OperationState {
    api_server: Fact<ApiServerEndpoint>,
}

impl OperationState {
    /// Empty state for a new operation
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the API server's load balancer address and ingress records.
    ///
    /// A second commit leaves the first value in place. If the offered value
    /// differs it is logged and dropped.
    pub fn commit_api_server(&mut self, endpoint: ApiServerEndpoint) -> Commit {
        let offered = endpoint.address.clone();
        let (commit, conflicting) = self.api_server.commit(endpoint);
        if conflicting {
            warn!(
                committed = self.api_server.get().map(|e| e.address.as_str()).unwrap_or_default(),
                offered = %offered,
                "api server endpoint already committed, discarding new value"
            );
        }
        commit
    }

    /// Hostname or IP of the API server load balancer
    pub fn api_server_address(&self) -> Result<&str> {
        self.api_server
            .get()
            .map(|e| e.address.as_str())
            .ok_or_else(|| Error::state_unavailable("apiServerAddress"))
    }

    /// Ingress records of the API server load balancer, in Service status order
    pub fn api_server_ingresses(&self) -> Result<&[LoadBalancerIngress]> {
        self.api_server
            .get()
            .map(|e| e.ingresses.as_slice())
            .ok_or_else(|| Error::state_unavailable("apiServerIngresses"))
    }
}
