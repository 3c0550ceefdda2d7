//! Metadata header names carried by release server calls.
//!
//! Names are lowercase because gRPC metadata keys travel as HTTP/2 header
//! names, which are lowercase on the wire.

/// Protocol version declared by the calling client.
pub const CLIENT_VERSION: &str = "x-helm-api-client";

/// User asserted by the authenticating proxy in front of the server.
pub const FORWARDED_USER: &str = "x-forwarded-user";

/// Groups asserted by the authenticating proxy, joined with [`GROUP_DELIMITER`].
pub const FORWARDED_GROUPS: &str = "x-forwarded-groups";

/// Separator between group names in [`FORWARDED_GROUPS`].
///
/// There is no escaping: a group name containing `|` cannot be represented.
pub const GROUP_DELIMITER: char = '|';
