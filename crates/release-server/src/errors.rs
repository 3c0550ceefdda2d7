//! Release server error types.
//!
//! Admission errors map to gRPC status codes returned to the caller.
//! Only the two facts a caller needs are exposed: the mismatched versions,
//! or a generic unauthorized indication.

use thiserror::Error;
use tonic::Status;

/// Client and server protocol versions are incompatible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("incompatible versions client[{client}] server[{server}]")]
pub struct VersionMismatch {
    pub client: String,
    pub server: String,
}

/// Identity enforcement is active and the call carried no asserted user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unauthorized access to release server")]
pub struct Unauthorized;

/// Terminal, call-scoped admission failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    VersionMismatch(#[from] VersionMismatch),

    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),
}

impl AdmissionError {
    /// Bounded label for metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::VersionMismatch(_) => "version_mismatch",
            AdmissionError::Unauthorized(_) => "unauthorized",
        }
    }
}

impl From<AdmissionError> for Status {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::VersionMismatch(mismatch) => {
                Status::failed_precondition(mismatch.to_string())
            }
            AdmissionError::Unauthorized(unauthorized) => {
                Status::unauthenticated(unauthorized.to_string())
            }
        }
    }
}

/// Startup failures surfaced from `main`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Metrics recorder could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    /// gRPC transport failed.
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_message_contains_both_versions() {
        let err = VersionMismatch {
            client: "1.0.0".to_string(),
            server: "2.3.0".to_string(),
        };
        assert_eq!(err.to_string(), "incompatible versions client[1.0.0] server[2.3.0]");
    }

    #[test]
    fn test_version_mismatch_maps_to_failed_precondition() {
        let err = AdmissionError::from(VersionMismatch {
            client: String::new(),
            server: "2.3.0".to_string(),
        });
        let status = Status::from(err);
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
        assert_eq!(
            status.message(),
            "incompatible versions client[] server[2.3.0]"
        );
    }

    #[test]
    fn test_unauthorized_maps_to_unauthenticated_with_generic_message() {
        let status = Status::from(AdmissionError::from(Unauthorized));
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert_eq!(status.message(), "unauthorized access to release server");
    }

    #[test]
    fn test_reason_labels() {
        let mismatch = AdmissionError::from(VersionMismatch {
            client: "1.0.0".to_string(),
            server: "2.3.0".to_string(),
        });
        assert_eq!(mismatch.reason(), "version_mismatch");
        assert_eq!(AdmissionError::from(Unauthorized).reason(), "unauthorized");
    }
}
