//! Derived resource names shared between the Garden and the Seed

use crate::BACKUP_NAMESPACE_PREFIX;

/// Name of the BackupInfrastructure record for a Shoot.
///
/// The record lives in the Shoot's project namespace in the Garden cluster and
/// is keyed by the Seed namespace and the Shoot's UID:
/// `<seed-namespace>--<shoot-uid>`.
pub fn backup_infrastructure_name(seed_namespace: &str, shoot_uid: &str) -> String {
    format!("{}--{}", seed_namespace, shoot_uid)
}

/// Name of the Seed namespace holding the backup for a BackupInfrastructure.
pub fn backup_namespace_name(backup_infrastructure_name: &str) -> String {
    format!("{}--{}", BACKUP_NAMESPACE_PREFIX, backup_infrastructure_name)
}
