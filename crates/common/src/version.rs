//! Protocol version compatibility between clients and the release server.
//!
//! The server never compares version strings itself; it asks a
//! [`VersionPolicy`]. The shipped policy, [`SameMajorLine`], admits a client
//! whose semantic version shares the server's major number.

use std::fmt;
use thiserror::Error;

/// Version of this build, shared by every crate in the workspace.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors produced when parsing a semantic version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    /// The input was empty.
    #[error("empty version string")]
    Empty,

    /// The input did not have the `MAJOR.MINOR.PATCH` shape.
    #[error("malformed version string: {0}")]
    Malformed(String),
}

/// A parsed semantic version (`[v]MAJOR.MINOR.PATCH[-pre][+build]`).
///
/// Pre-release and build suffixes are accepted but not retained; the
/// compatibility policy only looks at the numeric core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] if the string is empty or the numeric
    /// core is not three dot-separated decimal numbers.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        if input.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let malformed = || VersionParseError::Malformed(input.to_string());

        let unprefixed = input.strip_prefix('v').unwrap_or(input);
        let without_build = unprefixed
            .split_once('+')
            .map_or(unprefixed, |(core, _)| core);
        let core = without_build
            .split_once('-')
            .map_or(without_build, |(core, _)| core);

        let mut parts = core.split('.');
        let major = parts.next().and_then(parse_component).ok_or_else(malformed)?;
        let minor = parts.next().and_then(parse_component).ok_or_else(malformed)?;
        let patch = parts.next().and_then(parse_component).ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Decimal digits only; `u64::from_str` alone would also accept a leading `+`.
fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Decides whether a client version may talk to a server version.
///
/// Implementations must be deterministic and must treat an empty or
/// malformed client version as incompatible.
pub trait VersionPolicy: Send + Sync {
    fn is_compatible(&self, client_version: &str, server_version: &str) -> bool;
}

/// Clients on the same major release line as the server are compatible.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameMajorLine;

impl VersionPolicy for SameMajorLine {
    fn is_compatible(&self, client_version: &str, server_version: &str) -> bool {
        match (
            SemVer::parse(client_version),
            SemVer::parse(server_version),
        ) {
            (Ok(client), Ok(server)) => client.major == server.major,
            _ => false,
        }
    }
}

/// Build information reported by the `GetVersion` RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub sem_ver: String,
    pub git_commit: String,
    pub git_tree_state: String,
}

impl BuildInfo {
    /// Build information of the running binary.
    ///
    /// Git fields come from `RELEASE_GIT_COMMIT` / `RELEASE_GIT_TREE_STATE`
    /// at compile time and are empty when unset.
    #[must_use]
    pub fn current() -> Self {
        Self {
            sem_ver: format!("v{SERVER_VERSION}"),
            git_commit: option_env!("RELEASE_GIT_COMMIT")
                .unwrap_or_default()
                .to_string(),
            git_tree_state: option_env!("RELEASE_GIT_TREE_STATE")
                .unwrap_or_default()
                .to_string(),
        }
    }
}
