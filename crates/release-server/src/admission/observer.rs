//! Sink for admission records.
//!
//! Gates report what they decided through an [`AdmissionObserver`] instead
//! of logging directly, so their behaviour can be asserted in tests without
//! capturing log output.

use super::auth_gate::ForwardedIdentity;
use super::metadata::MethodName;
use crate::errors::VersionMismatch;

/// Receives one record per gate decision worth reporting.
pub trait AdmissionObserver: Send + Sync {
    /// Client and server versions are incompatible. `exempt` is true when
    /// the call was let through anyway.
    fn version_mismatch(&self, method: MethodName<'_>, mismatch: &VersionMismatch, exempt: bool);

    /// Identity enforcement is active and the call carried no user.
    fn unauthorized(&self, method: MethodName<'_>);

    /// Identity enforcement is active and the call carried a user.
    fn authenticated(&self, method: MethodName<'_>, identity: &ForwardedIdentity);
}

/// Writes admission records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AdmissionObserver for TracingObserver {
    fn version_mismatch(&self, method: MethodName<'_>, mismatch: &VersionMismatch, exempt: bool) {
        if exempt {
            tracing::debug!(
                target: "release.admission",
                method = %method,
                client_version = %mismatch.client,
                server_version = %mismatch.server,
                "Version mismatch ignored for exempt method"
            );
        } else {
            tracing::warn!(
                target: "release.admission",
                method = %method,
                client_version = %mismatch.client,
                server_version = %mismatch.server,
                "Rejected call: incompatible client version"
            );
        }
    }

    fn unauthorized(&self, method: MethodName<'_>) {
        tracing::warn!(
            target: "release.admission",
            method = %method,
            "Rejected call: no forwarded user"
        );
    }

    fn authenticated(&self, method: MethodName<'_>, identity: &ForwardedIdentity) {
        tracing::info!(
            target: "release.admission",
            method = %method,
            user = %identity.user,
            groups = %identity.groups_joined(),
            "Authenticated call"
        );
    }
}
