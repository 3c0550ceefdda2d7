//! Release server configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! never changes afterwards.

use crate::admission::AdmissionConfig;
use crate::grpc::server::ServerOptions;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default gRPC bind address.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "0.0.0.0:44134";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:44135";

/// Default gRPC message size limit (20 MiB; tonic's own default is 4 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Release server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// gRPC server bind address (default: "0.0.0.0:44134").
    pub grpc_bind_address: SocketAddr,

    /// Health endpoint bind address (default: "0.0.0.0:44135").
    pub health_bind_address: SocketAddr,

    /// Require an identity asserted by the authenticating proxy on every call.
    pub auth_proxy_enabled: bool,

    /// Maximum encoded size of a single gRPC message, in bytes.
    pub max_message_size_bytes: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let grpc_bind_address = parse_addr(
            vars,
            "RELEASE_GRPC_BIND_ADDRESS",
            DEFAULT_GRPC_BIND_ADDRESS,
        )?;

        let health_bind_address = parse_addr(
            vars,
            "RELEASE_HEALTH_BIND_ADDRESS",
            DEFAULT_HEALTH_BIND_ADDRESS,
        )?;

        let auth_proxy_enabled = match vars.get("RELEASE_AUTH_PROXY_ENABLED") {
            None => false,
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "RELEASE_AUTH_PROXY_ENABLED must be true or false, got '{raw}'"
                ))
            })?,
        };

        let max_message_size_bytes = match vars.get("RELEASE_MAX_MESSAGE_SIZE_BYTES") {
            None => DEFAULT_MAX_MESSAGE_SIZE_BYTES,
            Some(raw) => match raw.parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "RELEASE_MAX_MESSAGE_SIZE_BYTES must be a positive integer, got '{raw}'"
                    )))
                }
            },
        };

        let log_format = match vars.get("RELEASE_LOG_FORMAT").map(String::as_str) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "RELEASE_LOG_FORMAT must be text or json, got '{other}'"
                )))
            }
        };

        Ok(Config {
            grpc_bind_address,
            health_bind_address,
            auth_proxy_enabled,
            max_message_size_bytes,
            log_format,
        })
    }
}

impl Config {
    /// Admission settings derived from this configuration.
    #[must_use]
    pub fn admission(&self) -> AdmissionConfig {
        AdmissionConfig {
            identity_enforcement_enabled: self.auth_proxy_enabled,
        }
    }

    #[must_use]
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_message_size_bytes: self.max_message_size_bytes,
        }
    }
}

fn parse_addr(
    vars: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let raw = vars.get(key).map_or(default, String::as_str);
    raw.parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{key}='{raw}': {e}")))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
