//! # Release Test Utilities
//!
//! Shared test utilities for the release server.
//!
//! This crate provides:
//! - Server test harness (`TestReleaseServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use release_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestReleaseServer::spawn(true).await?;
//!
//!     let status = server
//!         .call_unary("/hapi.services.tiller.ReleaseService/GetVersion", &[])
//!         .await
//!         .unwrap_err();
//!
//!     assert_eq!(status.code(), tonic::Code::Unauthenticated);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
