//! Custom Resource Definitions read from the Garden cluster

mod backup_infrastructure;
mod types;

pub use backup_infrastructure::{
    BackupInfrastructure, BackupInfrastructureSpec, BackupInfrastructureStatus,
};
pub use types::{LastError, LastOperation, LastOperationState, LastOperationType};
