//! Readiness waits for Shoot cluster lifecycle operations
//!
//! Provisioning and decommissioning a Shoot involves waiting for external
//! systems: a cloud load balancer, control-plane pods in the Seed, a backup
//! infrastructure reconciled by another controller, a VPN tunnel into the
//! Shoot, and finally for all of it to disappear again. This crate provides:
//!
//! - [`poll::poll_until`], a bounded, cancellable fixed-interval poll loop
//! - [`readiness`], pure predicates mapping observed state to [`Readiness`]
//! - [`accessor`], read-only per-endpoint cluster access
//! - [`state::OperationState`], write-once facts passed between steps
//! - [`Botanist`] with its wait steps, sequenced by [`Botanist::provision`]
//!   and [`Botanist::decommission`]

#![deny(missing_docs)]

pub mod accessor;
pub mod botanist;
pub mod config;
pub mod flow;
pub mod poll;
pub mod readiness;
pub mod state;

pub use accessor::{ClusterReader, Endpoint, EndpointKubeconfigs, Endpoints};
pub use botanist::{Botanist, ShootContext};
pub use config::BotanistConfig;
pub use flow::{FlowReport, Step};
pub use poll::{poll_until, PollSpec};
pub use readiness::{PodReadinessPolicy, Readiness};
pub use state::OperationState;
