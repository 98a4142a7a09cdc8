//! Editor-side debug configuration for the probe-rs adapter.
//!
//! The configuration arrives as JSON (the `.zed/debug.json` style record)
//! and is forwarded to `probe-rs` as the launch/attach arguments, so every
//! key the bridge does not interpret itself is preserved verbatim.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::env::expand_env;
use crate::error::ConfigError;
use crate::server::ServerAddress;

/// The only adapter name this bridge serves.
pub const ADAPTER_NAME: &str = "probe-rs";

/// Fail unless `adapter_name` is [`ADAPTER_NAME`].
pub fn verify_adapter_name(adapter_name: &str) -> Result<(), ConfigError> {
    if adapter_name == ADAPTER_NAME {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedAdapter(adapter_name.to_string()))
    }
}

/// Whether the session starts the program or attaches to a running core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Flash and start the program.
    Launch,
    /// Attach to whatever is already running.
    Attach,
}

impl RequestKind {
    /// DAP command name for this request.
    pub fn command(self) -> &'static str {
        match self {
            RequestKind::Launch => "launch",
            RequestKind::Attach => "attach",
        }
    }

    /// Read the `request` field of a raw configuration.
    pub fn from_config(config: &Value) -> Result<Self, ConfigError> {
        let Some(value) = config.get("request").and_then(Value::as_str) else {
            return Err(ConfigError::MissingRequest);
        };
        match value {
            "launch" => Ok(RequestKind::Launch),
            "attach" => Ok(RequestKind::Attach),
            other => Err(ConfigError::InvalidRequest(other.to_string())),
        }
    }
}

/// Per-core debug target description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// Index of the core on the target chip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_index: Option<u32>,
    /// ELF binary loaded onto the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_binary: Option<String>,
    /// SVD file describing the peripherals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svd_file: Option<String>,
    /// Whether RTT channels are polled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt_enabled: Option<bool>,
    /// Remaining backend-specific keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Flashing behaviour for launch requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashingConfig {
    /// Flash the program binaries before starting.
    #[serde(default)]
    pub flashing_enabled: bool,
    /// Halt the core right after reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_after_reset: Option<bool>,
    /// Remaining backend-specific keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One debug configuration as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Adapter identifier; always `probe-rs`.
    #[serde(default = "default_adapter")]
    pub adapter: String,
    /// Launch or attach.
    pub request: RequestKind,
    /// Working directory, may reference environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// `host:port` of an already running `probe-rs dap-server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Ordered per-core configurations.
    #[serde(default)]
    pub core_configs: Vec<CoreConfig>,
    /// Flashing behaviour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashing_config: Option<FlashingConfig>,
    /// Everything else, forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_adapter() -> String {
    ADAPTER_NAME.to_string()
}

impl DebugConfig {
    /// A launch configuration with nothing but the required fields.
    pub fn new(request: RequestKind) -> Self {
        Self {
            label: None,
            adapter: default_adapter(),
            request,
            cwd: None,
            server: None,
            core_configs: Vec::new(),
            flashing_config: None,
            extra: Map::new(),
        }
    }

    /// Parse and check a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: Value = serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        Self::from_value(raw)
    }

    /// Parse and check a configuration from an already decoded JSON value.
    pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
        RequestKind::from_config(&raw)?;
        let config: DebugConfig =
            serde_json::from_value(raw).map_err(|e| ConfigError::Json(e.to_string()))?;
        verify_adapter_name(&config.adapter)?;
        if let Some(server) = &config.server {
            ServerAddress::parse(server)?;
        }
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parsed `server` field, if one is configured.
    pub fn server_address(&self) -> Result<Option<ServerAddress>, ConfigError> {
        self.server.as_deref().map(ServerAddress::parse).transpose()
    }

    /// Working directory with environment variables expanded.
    pub fn resolved_cwd(&self) -> Option<PathBuf> {
        self.cwd.as_deref().map(|cwd| PathBuf::from(expand_env(cwd)))
    }

    /// Arguments sent with the launch/attach request.
    ///
    /// The configuration is passed through as-is apart from `cwd`, which is
    /// expanded, and `server`, which is trimmed.
    pub fn to_request_arguments(&self) -> Result<Value, ConfigError> {
        let mut forwarded = self.clone();
        forwarded.cwd = self.cwd.as_deref().map(expand_env);
        forwarded.server = self.server.as_deref().map(|s| s.trim().to_string());
        serde_json::to_value(forwarded).map_err(|e| ConfigError::Json(e.to_string()))
    }
}
