use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::merge::merge_settings;
use crate::settings::Settings;
use crate::validate::validate_first;

/// Directory searched for in the project tree.
const PROJECT_DIR: &str = ".probe-bridge";

/// Content written into a newly-created global settings file.
const DEFAULT_SETTINGS_CONTENT: &str = r#"# probe-bridge settings
# Uncomment and edit settings below to override defaults.

# [log]
# level = "info"
# file = "/tmp/probe-bridge.log"

# [dap]
# request_timeout_ms = 30000   # unset: wait for every response
# connect_timeout_ms = 5000
# event_channel_capacity = 256
# probe_rs_command = "probe-rs"
# default_port = 50000
"#;

/// Load and merge bridge settings.
///
/// 1. Reads `config_dir/config.toml`, creating it with commented-out
///    defaults when it does not exist.
/// 2. Looks for `.probe-bridge/config.toml` from `project_dir` upward.
/// 3. Merges `Settings::default() <- global <- project` and validates.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, parse failure, or validation
/// failure.
pub fn load_settings(config_dir: &Path, project_dir: Option<&Path>) -> Result<Settings, ConfigError> {
    let global_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }
    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_SETTINGS_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("created default settings at {}", global_path.display());
    }

    let mut settings = Settings::default();

    let global_content = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global_content) {
        settings = merge_settings(&settings, &global_content)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_settings) {
        tracing::debug!("applying project settings from {}", project_path.display());
        let project_content = std::fs::read_to_string(&project_path)?;
        settings = merge_settings(&settings, &project_content)?;
    }

    validate_first(&settings)?;
    Ok(settings)
}

/// Parse a TOML string directly into validated [`Settings`].
pub fn settings_from_str(toml_str: &str) -> Result<Settings, ConfigError> {
    let settings: Settings =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_first(&settings)?;
    Ok(settings)
}

fn find_project_settings(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR).join("config.toml"))
        .find(|candidate| candidate.is_file())
}

fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_default_file_when_missing() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");

        let settings = load_settings(&cfg_dir, None).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(cfg_dir.join("config.toml").exists());
    }

    #[test]
    fn reads_existing_global_file() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[dap]\ndefault_port = 6000\n").unwrap();

        let settings = load_settings(&cfg_dir, None).unwrap();
        assert_eq!(settings.dap.default_port, 6000);
        assert_eq!(settings.dap.probe_rs_command, "probe-rs");
    }

    #[test]
    fn project_file_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[dap]\ndefault_port = 6000\n").unwrap();

        let project = tmp.path().join("firmware");
        std::fs::create_dir_all(project.join(PROJECT_DIR)).unwrap();
        std::fs::write(
            project.join(PROJECT_DIR).join("config.toml"),
            "[dap]\ndefault_port = 7000\n",
        )
        .unwrap();
        let nested = project.join("src").join("bin");
        std::fs::create_dir_all(&nested).unwrap();

        let settings = load_settings(&cfg_dir, Some(&nested)).unwrap();
        assert_eq!(settings.dap.default_port, 7000);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[dap]\nrequest_timeout_ms = 0\n").unwrap();

        let err = load_settings(&cfg_dir, None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn settings_from_str_parses_and_validates() {
        let settings = settings_from_str("[log]\nlevel = \"trace\"\n").unwrap();
        assert_eq!(settings.log.level.as_str(), "trace");
        assert!(settings_from_str("[dap]\ndefault_port = 0\n").is_err());
        assert!(settings_from_str("{{bad}}").is_err());
    }

    #[test]
    fn template_is_comment_only() {
        assert!(!has_non_comment_content(DEFAULT_SETTINGS_CONTENT));
        assert!(has_non_comment_content("# c\n[dap]\n"));
    }
}
