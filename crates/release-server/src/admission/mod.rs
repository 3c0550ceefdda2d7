//! Request admission for every inbound gRPC call.
//!
//! A call must pass two gates, in this order, before it reaches the
//! instrumented handler:
//!
//! 1. [`VersionGate`] - the client's declared protocol version must be
//!    compatible with the server's, except for [`EXEMPT_METHOD`].
//! 2. [`AuthGate`] - when identity enforcement is enabled, the call must
//!    carry a user asserted by the authenticating proxy. No exemptions.
//!
//! The order matters: the version exemption must never let a call skip
//! identity enforcement.
//!
//! ```text
//! request head ──► VersionGate ──► AuthGate ──► GrpcMetricsLayer ──► handler
//!                      │               │
//!                      └──► FAILED_PRECONDITION / UNAUTHENTICATED
//! ```
//!
//! Both gates read only the request head, so a streaming call is admitted
//! exactly once, before any message is read or written.

pub mod auth_gate;
pub mod layer;
pub mod metadata;
pub mod observer;
pub mod version_gate;

pub use auth_gate::{AuthGate, ForwardedIdentity};
pub use layer::{Admission, AdmissionLayer, AdmissionService};
pub use metadata::{CallContext, MetadataSource, MethodName};
pub use observer::{AdmissionObserver, TracingObserver};
pub use version_gate::{VersionGate, EXEMPT_METHOD};

/// Process-wide admission settings, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdmissionConfig {
    /// Require a forwarded user on every call.
    pub identity_enforcement_enabled: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing {
    //! Helpers shared by the admission unit tests.

    use super::{AdmissionObserver, ForwardedIdentity, MethodName};
    use crate::errors::VersionMismatch;
    use axum::http::{HeaderMap, HeaderValue};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum AdmissionRecord {
        VersionMismatch {
            method: String,
            client: String,
            server: String,
            exempt: bool,
        },
        Unauthorized {
            method: String,
        },
        Authenticated {
            method: String,
            user: String,
            groups: String,
        },
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        records: Mutex<Vec<AdmissionRecord>>,
    }

    impl RecordingObserver {
        pub(crate) fn records(&self) -> Vec<AdmissionRecord> {
            self.records.lock().unwrap().clone()
        }

        fn push(&self, record: AdmissionRecord) {
            self.records.lock().unwrap().push(record);
        }
    }

    impl AdmissionObserver for RecordingObserver {
        fn version_mismatch(
            &self,
            method: MethodName<'_>,
            mismatch: &VersionMismatch,
            exempt: bool,
        ) {
            self.push(AdmissionRecord::VersionMismatch {
                method: method.to_string(),
                client: mismatch.client.clone(),
                server: mismatch.server.clone(),
                exempt,
            });
        }

        fn unauthorized(&self, method: MethodName<'_>) {
            self.push(AdmissionRecord::Unauthorized {
                method: method.to_string(),
            });
        }

        fn authenticated(&self, method: MethodName<'_>, identity: &ForwardedIdentity) {
            self.push(AdmissionRecord::Authenticated {
                method: method.to_string(),
                user: identity.user.clone(),
                groups: identity.groups_joined(),
            });
        }
    }

    pub(crate) fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }
}
