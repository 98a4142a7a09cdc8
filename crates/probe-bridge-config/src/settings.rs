use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port the bridge asks `probe-rs dap-server` to listen on when no server
/// address is configured.
pub const DEFAULT_PORT: u16 = 50_000;

/// Default budget for connecting to the backend.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Every frame on the wire.
    Trace,
    /// Session lifecycle and request traffic.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Name understood by `tracing` filter directives.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Log file override; defaults to the platform log directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Protocol bridge tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DapSettings {
    /// How long a request may wait for its response. Unset means no limit:
    /// launching with flashing enabled can take arbitrarily long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// How long connecting to the backend may take.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Buffered session events per subscriber before events are dropped.
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
    /// Executable used when the bridge has to start `probe-rs` itself.
    #[serde(default = "default_probe_rs_command")]
    pub probe_rs_command: String,
    /// Port passed to `probe-rs dap-server --port`.
    #[serde(default = "default_port")]
    pub default_port: u16,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_event_capacity() -> usize {
    256
}

fn default_probe_rs_command() -> String {
    "probe-rs".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl DapSettings {
    /// Request timeout as a [`Duration`], if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for DapSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            event_channel_capacity: default_event_capacity(),
            probe_rs_command: default_probe_rs_command(),
            default_port: DEFAULT_PORT,
        }
    }
}

/// Top-level bridge settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Logging settings.
    #[serde(default)]
    pub log: LogSettings,
    /// Protocol bridge settings.
    #[serde(default)]
    pub dap: DapSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_have_expected_values() {
        let settings = Settings::default();
        assert_eq!(settings.log.level, LogLevel::Info);
        assert!(settings.log.file.is_none());
        assert_eq!(settings.dap.request_timeout_ms, None);
        assert_eq!(settings.dap.request_timeout(), None);
        assert_eq!(settings.dap.connect_timeout_ms, 5000);
        assert_eq!(settings.dap.event_channel_capacity, 256);
        assert_eq!(settings.dap.probe_rs_command, "probe-rs");
        assert_eq!(settings.dap.default_port, 50_000);
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let dap = DapSettings {
            request_timeout_ms: Some(250),
            connect_timeout_ms: 1500,
            ..DapSettings::default()
        };
        assert_eq!(dap.request_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(dap.connect_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let input = r#"
[log]
level = "debug"

[dap]
default_port = 50001
"#;
        let settings: Settings = toml::from_str(input).expect("parse toml");
        assert_eq!(settings.log.level, LogLevel::Debug);
        assert_eq!(settings.dap.default_port, 50001);
        assert_eq!(settings.dap.probe_rs_command, "probe-rs");
        assert_eq!(settings.dap.request_timeout_ms, None);
    }

    #[test]
    fn toml_roundtrip_preserves_values() {
        let settings = Settings {
            log: LogSettings {
                level: LogLevel::Trace,
                file: Some(PathBuf::from("/tmp/bridge.log")),
            },
            dap: DapSettings {
                request_timeout_ms: Some(100),
                connect_timeout_ms: 200,
                event_channel_capacity: 8,
                probe_rs_command: "/opt/probe-rs/bin/probe-rs".into(),
                default_port: 4000,
            },
        };
        let text = toml::to_string(&settings).expect("serialize");
        let back: Settings = toml::from_str(&text).expect("deserialize");
        assert_eq!(settings, back);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let settings: Settings = toml::from_str("").expect("parse empty toml");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn log_level_names() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::default().as_str(), "info");
    }
}
