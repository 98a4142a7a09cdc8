use crate::debug_config::DebugConfig;
use crate::error::ConfigError;
use crate::server::ServerAddress;
use crate::settings::DapSettings;

/// How to reach the debug backend for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterBinary {
    /// Program to start before connecting; `None` when a server is already
    /// running.
    pub command: Option<String>,
    /// Arguments for `command`.
    pub arguments: Vec<String>,
    /// Where the DAP server listens.
    pub connection: ServerAddress,
}

impl AdapterBinary {
    /// Decide between connecting to a configured server and starting
    /// `probe-rs dap-server` locally.
    ///
    /// `user_path` overrides the `probe-rs` executable from the settings.
    pub fn resolve(
        config: &DebugConfig,
        settings: &DapSettings,
        user_path: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if let Some(address) = config.server_address()? {
            tracing::debug!(%address, "using configured probe-rs server");
            return Ok(Self {
                command: None,
                arguments: Vec::new(),
                connection: address,
            });
        }

        let command = user_path
            .map(str::to_string)
            .unwrap_or_else(|| settings.probe_rs_command.clone());
        let port = settings.default_port;
        tracing::debug!(%command, port, "no server configured, starting probe-rs dap-server");

        Ok(Self {
            command: Some(command),
            arguments: vec![
                "dap-server".to_string(),
                "--port".to_string(),
                port.to_string(),
            ],
            connection: ServerAddress::localhost(port),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_config::RequestKind;

    #[test]
    fn configured_server_needs_no_command() {
        let mut config = DebugConfig::new(RequestKind::Attach);
        config.server = Some("192.168.0.7:50001 ".into());
        let binary = AdapterBinary::resolve(&config, &DapSettings::default(), None).unwrap();
        assert_eq!(binary.command, None);
        assert!(binary.arguments.is_empty());
        assert_eq!(binary.connection.to_string(), "192.168.0.7:50001");
    }

    #[test]
    fn missing_server_spawns_dap_server_on_default_port() {
        let config = DebugConfig::new(RequestKind::Launch);
        let binary = AdapterBinary::resolve(&config, &DapSettings::default(), None).unwrap();
        assert_eq!(binary.command.as_deref(), Some("probe-rs"));
        assert_eq!(binary.arguments, vec!["dap-server", "--port", "50000"]);
        assert_eq!(binary.connection, ServerAddress::localhost(50000));
    }

    #[test]
    fn user_path_and_settings_port_are_honoured() {
        let config = DebugConfig::new(RequestKind::Launch);
        let settings = DapSettings {
            default_port: 4242,
            ..DapSettings::default()
        };
        let binary =
            AdapterBinary::resolve(&config, &settings, Some("/opt/bin/probe-rs")).unwrap();
        assert_eq!(binary.command.as_deref(), Some("/opt/bin/probe-rs"));
        assert_eq!(binary.arguments[2], "4242");
        assert_eq!(binary.connection.port, 4242);
    }

    #[test]
    fn malformed_server_propagates_error() {
        let mut config = DebugConfig::new(RequestKind::Attach);
        config.server = Some("nonsense".into());
        let err = AdapterBinary::resolve(&config, &DapSettings::default(), None).unwrap_err();
        assert!(matches!(err, ConfigError::ServerFormat(_)));
    }
}
