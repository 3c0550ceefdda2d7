//! Common utilities and types shared by the release server and its clients.

#![warn(clippy::pedantic)]

/// Module for out-of-band metadata header names
pub mod headers;

/// Module for protocol version compatibility and build information
pub mod version;
