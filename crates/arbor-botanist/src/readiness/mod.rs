//! Readiness predicates
//!
//! Each predicate maps the state observed through a [`ClusterReader`] call to a
//! [`Readiness`] outcome. Predicates are pure: all I/O happens in the caller,
//! which passes the lookup result in unchanged so that error classification
//! (transient vs terminal) stays with the predicate that owns the policy.
//!
//! [`ClusterReader`]: crate::accessor::ClusterReader

mod backup;
mod load_balancer;
mod pods;
mod removal;
mod tunnel;

pub use backup::backup_infrastructure_reconciled;
pub use load_balancer::{load_balancer_ready, ApiServerEndpoint};
pub use pods::{pods_ready, PodReadinessPolicy};
pub use removal::resource_removed;
pub use tunnel::{running_pod, tunnel_probe};

use arbor_common::Error;

/// Outcome of one readiness check
#[derive(Debug)]
pub enum Readiness<T = ()> {
    /// Not in the target state yet; polling continues
    Pending {
        /// What is being waited for, for progress logs
        reason: String,
        /// Transient lookup error observed on this tick, if any
        error: Option<String>,
    },
    /// Target state reached; polling stops with this value
    Ready(T),
    /// Target state will never be reached; polling stops with this cause
    Failed(Error),
}

impl<T> Readiness<T> {
    /// Pending without an error: the resource simply isn't there yet
    pub fn waiting(reason: impl Into<String>) -> Self {
        Self::Pending {
            reason: reason.into(),
            error: None,
        }
    }

    /// Pending because the lookup itself failed in a retryable way
    pub fn transient(reason: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Pending {
            reason: reason.into(),
            error: Some(error.to_string()),
        }
    }

    /// Returns true for [`Readiness::Ready`]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns true for [`Readiness::Pending`]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Returns true for [`Readiness::Failed`]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Transform the ready value, keeping pending and failed outcomes
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Readiness<U> {
        match self {
            Self::Pending { reason, error } => Readiness::Pending { reason, error },
            Self::Ready(value) => Readiness::Ready(f(value)),
            Self::Failed(e) => Readiness::Failed(e),
        }
    }
}
