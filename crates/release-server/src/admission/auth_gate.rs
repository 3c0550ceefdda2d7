//! Forwarded identity gate.
//!
//! When the server runs behind an authenticating proxy, the proxy asserts
//! the caller's user and groups in metadata. The gate only checks that a
//! user was asserted; it does not authorize individual operations.

use super::metadata::CallContext;
use super::observer::AdmissionObserver;
use super::AdmissionConfig;
use crate::errors::Unauthorized;
use std::collections::BTreeSet;

/// Identity asserted by the authenticating proxy.
///
/// Inserted into the request extensions of every admitted call. Empty when
/// identity enforcement is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForwardedIdentity {
    pub user: String,
    pub groups: BTreeSet<String>,
}

impl ForwardedIdentity {
    /// Identity of calls admitted without enforcement.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user.is_empty()
    }

    /// Groups joined with `,` for log output.
    #[must_use]
    pub fn groups_joined(&self) -> String {
        self.groups
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Requires a forwarded user when identity enforcement is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthGate {
    config: AdmissionConfig,
}

impl AuthGate {
    #[must_use]
    pub fn new(config: AdmissionConfig) -> Self {
        Self { config }
    }

    /// Resolve the caller's identity.
    ///
    /// With enforcement disabled every call is admitted as anonymous and
    /// the metadata is not read. With enforcement enabled a missing or
    /// empty user is rejected; no method is exempt.
    pub fn check(
        &self,
        ctx: &CallContext<'_>,
        observer: &dyn AdmissionObserver,
    ) -> Result<ForwardedIdentity, Unauthorized> {
        if !self.config.identity_enforcement_enabled {
            return Ok(ForwardedIdentity::anonymous());
        }

        let user = ctx.forwarded_user();
        if user.is_empty() {
            observer.unauthorized(ctx.method());
            return Err(Unauthorized);
        }

        let identity = ForwardedIdentity {
            user: user.to_string(),
            groups: ctx.forwarded_groups(),
        };
        observer.authenticated(ctx.method(), &identity);
        Ok(identity)
    }
}
