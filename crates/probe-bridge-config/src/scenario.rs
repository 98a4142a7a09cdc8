//! Conversion of a generic editor launch request into a probe-rs
//! configuration.

use std::collections::HashMap;

use crate::debug_config::{verify_adapter_name, CoreConfig, DebugConfig, FlashingConfig, RequestKind};
use crate::error::ConfigError;

/// A "run this program" request as the editor describes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchRequest {
    /// Program binary.
    pub program: String,
    /// Working directory.
    pub cwd: Option<String>,
    /// Program arguments.
    pub args: Vec<String>,
    /// Environment variables.
    pub envs: HashMap<String, String>,
}

/// Attach to an existing host process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachRequest {
    /// Host process id.
    pub process_id: Option<u32>,
}

/// Which generic request the editor made.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioRequest {
    /// Run a program.
    Launch(LaunchRequest),
    /// Attach to a process.
    Attach(AttachRequest),
}

/// Generic debug scenario handed over by the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugScenario {
    /// Display name.
    pub label: String,
    /// Adapter identifier.
    pub adapter: String,
    /// What to do.
    pub request: ScenarioRequest,
    /// Halt right after reset.
    pub stop_on_entry: Option<bool>,
}

impl DebugScenario {
    /// Build the probe-rs configuration for this scenario.
    ///
    /// Only a single program can be described this way, so the result has a
    /// single core configuration and flashing turned on.
    pub fn into_debug_config(self) -> Result<DebugConfig, ConfigError> {
        verify_adapter_name(&self.adapter)?;

        let launch = match self.request {
            ScenarioRequest::Launch(launch) => launch,
            ScenarioRequest::Attach(_) => {
                return Err(ConfigError::Unsupported(
                    "Attaching to a process is not supported by this debug adapter".into(),
                ))
            }
        };
        if !launch.args.is_empty() {
            return Err(ConfigError::Unsupported(
                "Passing arguments is not supported by this debug adapter".into(),
            ));
        }
        if !launch.envs.is_empty() {
            return Err(ConfigError::Unsupported(
                "Setting environment variables is not supported by this debug adapter".into(),
            ));
        }

        let mut config = DebugConfig::new(RequestKind::Launch);
        config.label = Some(self.label);
        config.adapter = self.adapter;
        config.cwd = launch.cwd;
        config.core_configs = vec![CoreConfig {
            program_binary: Some(launch.program),
            ..CoreConfig::default()
        }];
        config.flashing_config = Some(FlashingConfig {
            flashing_enabled: true,
            halt_after_reset: self.stop_on_entry,
            ..FlashingConfig::default()
        });
        Ok(config)
    }
}
