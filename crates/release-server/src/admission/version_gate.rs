//! Client protocol version gate.

use super::metadata::CallContext;
use super::observer::AdmissionObserver;
use crate::errors::VersionMismatch;
use common::version::{SameMajorLine, VersionPolicy, SERVER_VERSION};
use std::fmt;
use std::sync::Arc;

/// The one method a client may call whatever its version, so that an
/// incompatible client can still find out which server it is talking to.
pub const EXEMPT_METHOD: &str = "GetVersion";

/// Rejects calls whose declared client version the policy does not accept.
#[derive(Clone)]
pub struct VersionGate {
    server_version: Arc<str>,
    policy: Arc<dyn VersionPolicy>,
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new(SERVER_VERSION, Arc::new(SameMajorLine))
    }
}

impl VersionGate {
    #[must_use]
    pub fn new(server_version: impl Into<Arc<str>>, policy: Arc<dyn VersionPolicy>) -> Self {
        Self {
            server_version: server_version.into(),
            policy,
        }
    }

    #[must_use]
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Check the call's client version against the server version.
    ///
    /// An incompatible version is reported to `observer` with both version
    /// strings. The error is suppressed when the method component is
    /// [`EXEMPT_METHOD`]; the service component plays no part.
    pub fn check(
        &self,
        ctx: &CallContext<'_>,
        observer: &dyn AdmissionObserver,
    ) -> Result<(), VersionMismatch> {
        let client_version = ctx.client_version();
        if self
            .policy
            .is_compatible(client_version, &self.server_version)
        {
            return Ok(());
        }

        let method = ctx.method();
        let exempt = method.method == EXEMPT_METHOD;
        let mismatch = VersionMismatch {
            client: client_version.to_string(),
            server: self.server_version.to_string(),
        };
        observer.version_mismatch(method, &mismatch, exempt);

        if exempt {
            Ok(())
        } else {
            Err(mismatch)
        }
    }
}

impl fmt::Debug for VersionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionGate")
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::admission::testing::{headers, AdmissionRecord, RecordingObserver};
    use common::headers::CLIENT_VERSION;

    struct FixedPolicy(bool);

    impl VersionPolicy for FixedPolicy {
        fn is_compatible(&self, _client_version: &str, _server_version: &str) -> bool {
            self.0
        }
    }

    fn gate() -> VersionGate {
        VersionGate::new("2.3.0", Arc::new(SameMajorLine))
    }

    #[test]
    fn test_same_major_client_admitted() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[(CLIENT_VERSION, "2.1.0")]);
        let ctx = CallContext::new("/hapi.services.tiller.ReleaseService/InstallRelease", &metadata);

        assert!(gate().check(&ctx, &observer).is_ok());
        assert!(observer.records().is_empty());
    }

    #[test]
    fn test_older_major_rejected_for_regular_method() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[(CLIENT_VERSION, "1.0.0")]);
        let ctx = CallContext::new("/Svc/Install", &metadata);

        let err = gate().check(&ctx, &observer).unwrap_err();

        assert_eq!(err.client, "1.0.0");
        assert_eq!(err.server, "2.3.0");
        assert_eq!(
            observer.records(),
            vec![AdmissionRecord::VersionMismatch {
                method: "/Svc/Install".to_string(),
                client: "1.0.0".to_string(),
                server: "2.3.0".to_string(),
                exempt: false,
            }]
        );
    }

    #[test]
    fn test_older_major_admitted_for_exempt_method() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[(CLIENT_VERSION, "1.0.0")]);
        let ctx = CallContext::new("/Svc/GetVersion", &metadata);

        assert!(gate().check(&ctx, &observer).is_ok());
        assert_eq!(
            observer.records(),
            vec![AdmissionRecord::VersionMismatch {
                method: "/Svc/GetVersion".to_string(),
                client: "1.0.0".to_string(),
                server: "2.3.0".to_string(),
                exempt: true,
            }]
        );
    }

    #[test]
    fn test_exemption_ignores_service_component() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[]);

        for path in ["/AnyService/GetVersion", "/other.pkg.Thing/GetVersion"] {
            let ctx = CallContext::new(path, &metadata);
            assert!(gate().check(&ctx, &observer).is_ok(), "{path} should be exempt");
        }
    }

    #[test]
    fn test_exemption_requires_exact_method_name() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[]);

        for path in ["/Svc/getversion", "/Svc/GetVersions", "/Svc/GetVersion/x"] {
            let ctx = CallContext::new(path, &metadata);
            assert!(gate().check(&ctx, &observer).is_err(), "{path} should not be exempt");
        }
    }

    #[test]
    fn test_malformed_method_never_exempt() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[]);
        let ctx = CallContext::new("GetVersion", &metadata);

        assert!(gate().check(&ctx, &observer).is_err());
    }

    #[test]
    fn test_missing_version_rejected_with_empty_client() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[]);
        let ctx = CallContext::new("/Svc/Install", &metadata);

        let err = gate().check(&ctx, &observer).unwrap_err();
        assert_eq!(err.client, "");
    }

    #[test]
    fn test_policy_is_consulted() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[(CLIENT_VERSION, "anything")]);
        let ctx = CallContext::new("/Svc/Install", &metadata);

        let permissive = VersionGate::new("2.3.0", Arc::new(FixedPolicy(true)));
        let strict = VersionGate::new("2.3.0", Arc::new(FixedPolicy(false)));

        assert!(permissive.check(&ctx, &observer).is_ok());
        assert!(strict.check(&ctx, &observer).is_err());
    }

    #[test]
    fn test_repeated_checks_are_identical() {
        let observer = RecordingObserver::default();
        let metadata = headers(&[(CLIENT_VERSION, "1.0.0")]);
        let ctx = CallContext::new("/Svc/Install", &metadata);
        let gate = gate();

        assert_eq!(gate.check(&ctx, &observer), gate.check(&ctx, &observer));
    }

    #[test]
    fn test_default_gate_uses_build_version() {
        let gate = VersionGate::default();
        assert_eq!(gate.server_version(), SERVER_VERSION);
        assert!(format!("{gate:?}").contains(SERVER_VERSION));
    }
}
