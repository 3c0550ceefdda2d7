//! Release Server Library
//!
//! Request admission for the release service: every gRPC call is checked
//! for a compatible client protocol version and, when the server runs
//! behind an authenticating proxy, for a forwarded user identity before it
//! reaches a handler.
//!
//! # Call flow
//!
//! ```text
//! client ──► AdmissionLayer ──► GrpcMetricsLayer ──► ReleaseService handler
//!             ├─ VersionGate (GetVersion exempt)
//!             └─ AuthGate    (no exemptions)
//! ```
//!
//! # Modules
//!
//! - [`admission`] - version and identity gates, and the tower layer running them
//! - [`config`] - service configuration from environment
//! - [`errors`] - admission and startup error types
//! - [`grpc`] - the version service, server assembly and client helpers
//! - [`observability`] - metrics, health probes

#![warn(clippy::pedantic)]

pub mod admission;
pub mod config;
pub mod errors;
pub mod grpc;
pub mod observability;
