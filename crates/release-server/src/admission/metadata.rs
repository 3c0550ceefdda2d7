//! Call metadata extraction.
//!
//! Admission decisions only look at the request head: the `:path` (the
//! full gRPC method name) and the metadata headers. Both are available
//! before any message is read, for unary and streaming calls alike.

use axum::http;
use common::headers::{CLIENT_VERSION, FORWARDED_GROUPS, FORWARDED_USER, GROUP_DELIMITER};
use std::collections::BTreeSet;
use std::fmt;
use tonic::metadata::MetadataMap;

/// Sentinel used for both components of an unparseable method name.
pub const UNKNOWN: &str = "unknown";

/// Read-only view over call metadata.
///
/// Implemented for the raw HTTP/2 header map seen by tower layers and for
/// tonic's `MetadataMap` seen by interceptors and handlers.
pub trait MetadataSource: Send + Sync {
    /// First value for `key`, or `None` when the header is absent.
    ///
    /// A first value that is not visible ASCII has no `&str` form and is
    /// reported as absent. Later values are never consulted, even when the
    /// first one is unreadable.
    fn first_value(&self, key: &str) -> Option<&str>;
}

impl MetadataSource for http::HeaderMap {
    fn first_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|value| value.to_str().ok())
    }
}

impl MetadataSource for MetadataMap {
    fn first_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|value| value.to_str().ok())
    }
}

/// A gRPC method name split into service and method components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodName<'a> {
    pub service: &'a str,
    pub method: &'a str,
}

impl<'a> MethodName<'a> {
    /// Split `/<service>/<method>`.
    ///
    /// Anything else (missing leading slash, empty component, extra
    /// segments) resolves to `("unknown", "unknown")`, which never matches
    /// a real method.
    #[must_use]
    pub fn parse(full_method: &'a str) -> Self {
        full_method
            .strip_prefix('/')
            .and_then(|rest| rest.split_once('/'))
            .filter(|(service, method)| {
                !service.is_empty() && !method.is_empty() && !method.contains('/')
            })
            .map_or_else(Self::unknown, |(service, method)| Self { service, method })
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self {
            service: UNKNOWN,
            method: UNKNOWN,
        }
    }
}

impl fmt::Display for MethodName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.service, self.method)
    }
}

/// Per-call view used by the admission gates.
///
/// Borrowed from the request; created when admission starts and dropped
/// when it finishes.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    method: MethodName<'a>,
    metadata: &'a dyn MetadataSource,
}

impl<'a> CallContext<'a> {
    #[must_use]
    pub fn new(full_method: &'a str, metadata: &'a dyn MetadataSource) -> Self {
        Self {
            method: MethodName::parse(full_method),
            metadata,
        }
    }

    /// Build a context from an HTTP/2 request head.
    #[must_use]
    pub fn from_request<B>(request: &'a http::Request<B>) -> Self {
        Self::new(request.uri().path(), request.headers())
    }

    #[must_use]
    pub fn method(&self) -> MethodName<'a> {
        self.method
    }

    /// Declared client version, empty when absent.
    #[must_use]
    pub fn client_version(&self) -> &'a str {
        self.metadata.first_value(CLIENT_VERSION).unwrap_or_default()
    }

    /// User asserted by the authenticating proxy, empty when absent.
    #[must_use]
    pub fn forwarded_user(&self) -> &'a str {
        self.metadata.first_value(FORWARDED_USER).unwrap_or_default()
    }

    /// Groups asserted by the authenticating proxy.
    ///
    /// A plain split on `|`: the delimiter cannot be escaped and every
    /// segment is kept, so `a||b` yields an empty group name and a present
    /// but empty header yields the single group `""`. An absent header
    /// yields no groups.
    #[must_use]
    pub fn forwarded_groups(&self) -> BTreeSet<String> {
        self.metadata
            .first_value(FORWARDED_GROUPS)
            .map(|raw| raw.split(GROUP_DELIMITER).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Metadata is left out: it may carry identity headers.
        f.debug_struct("CallContext")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
