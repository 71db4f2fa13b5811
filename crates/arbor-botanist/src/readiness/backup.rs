//! Reconciliation status of a Shoot's BackupInfrastructure record

use kube::ResourceExt;

use arbor_common::crd::{BackupInfrastructure, LastOperationState};
use arbor_common::{Error, Result};

use super::Readiness;

/// Ready once the record's last operation succeeded; failed once it errored.
///
/// An errored last operation is terminal and carries `status.lastError`'s
/// description as the cause. A record that does not exist yet, has no last
/// operation, or whose operation is still running keeps the step pending.
pub fn backup_infrastructure_reconciled(
    observed: Result<Option<BackupInfrastructure>>,
) -> Readiness {
    let infra = match observed {
        Ok(Some(infra)) => infra,
        Ok(None) => return Readiness::waiting("backup infrastructure record does not exist yet"),
        Err(e) => return Readiness::transient("looking up backup infrastructure", e),
    };

    let status = infra.status.as_ref();
    let Some(last_operation) = status.and_then(|s| s.last_operation.as_ref()) else {
        return Readiness::waiting("backup infrastructure has not been reconciled yet");
    };

    match last_operation.state {
        LastOperationState::Succeeded => Readiness::Ready(()),
        state if state.is_error() => {
            let description = status
                .and_then(|s| s.last_error.as_ref())
                .map(|e| e.description.clone())
                .filter(|d| !d.is_empty())
                .or_else(|| Some(last_operation.description.clone()).filter(|d| !d.is_empty()))
                .unwrap_or_else(|| format!("last operation ended in state {}", state));
            Readiness::Failed(Error::terminal(
                format!(
                    "backupinfrastructure {}/{}",
                    infra.namespace().unwrap_or_default(),
                    infra.name_any()
                ),
                description,
            ))
        }
        state if state.is_in_progress() => Readiness::waiting(format!(
            "backup infrastructure last operation is {} ({}%)",
            state, last_operation.progress
        )),
        state => Readiness::waiting(format!(
            "backup infrastructure last operation was {}, waiting for the next one",
            state
        )),
    }
}
