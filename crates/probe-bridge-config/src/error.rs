use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading settings or interpreting a debug
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The specified file was not found.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to create the default settings file.
    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// The debug configuration is not valid JSON or has the wrong shape.
    #[error("Failed to parse JSON config: {0}")]
    Json(String),

    /// A settings value failed validation.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// The dotted field path (e.g. `dap.request_timeout_ms`).
        field: String,
        /// Human-readable description of the violation.
        message: String,
    },

    /// The configuration names a different debug adapter.
    #[error("Unsupported debug adapter name '{0}', expected 'probe-rs'")]
    UnsupportedAdapter(String),

    /// The `request` field is absent.
    #[error("Missing 'request' field in configuration")]
    MissingRequest,

    /// The `request` field holds something other than launch/attach.
    #[error(
        "Invalid value for the 'request' field in configuration. Value is {0}, but only 'launch' and 'attach' are supported"
    )]
    InvalidRequest(String),

    /// `server` is not of the form `host:port`.
    #[error("Invalid server string format '{0}'. Expected format: 'host:port'")]
    ServerFormat(String),

    /// The host part of `server` is not an IPv4 address.
    #[error("Invalid IP address '{0}'. Expected a valid IPv4 address")]
    ServerHost(String),

    /// The port part of `server` is not a valid port number.
    #[error("Invalid port number '{0}'. Expected a number between 0 and 65535")]
    ServerPort(String),

    /// The requested scenario cannot be expressed for this adapter.
    #[error("{0}")]
    Unsupported(String),

    /// An I/O error occurred while reading or writing config files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
