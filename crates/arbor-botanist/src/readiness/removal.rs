//! Absence checks for teardown steps
//!
//! Teardown inverts the usual polarity: the lookup returning not-found is the
//! success condition.

use kube::Resource;

use arbor_common::Result;

use super::Readiness;

/// Ready once the lookup reports the object as gone.
///
/// `observed` is the result of a get where not-found has already been mapped
/// to `Ok(None)`. Any other lookup error is returned as the failure cause
/// rather than being mistaken for absence.
pub fn resource_removed<K: Resource>(observed: Result<Option<K>>, what: &str) -> Readiness {
    match observed {
        Ok(None) => Readiness::Ready(()),
        Ok(Some(obj)) if obj.meta().deletion_timestamp.is_some() => {
            Readiness::waiting(format!("{} is being deleted", what))
        }
        Ok(Some(_)) => Readiness::waiting(format!("{} still exists", what)),
        Err(e) => Readiness::Failed(e),
    }
}
