use crate::error::ConfigError;
use crate::settings::Settings;

/// Validate [`Settings`], returning every violation found.
pub fn validate(settings: &Settings) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let dap = &settings.dap;

    if dap.request_timeout_ms == Some(0) {
        errors.push(violation("dap.request_timeout_ms", "must be greater than 0 when set"));
    }
    if dap.connect_timeout_ms == 0 {
        errors.push(violation("dap.connect_timeout_ms", "must be greater than 0"));
    }
    if dap.event_channel_capacity == 0 {
        errors.push(violation("dap.event_channel_capacity", "must be at least 1"));
    }
    if dap.probe_rs_command.trim().is_empty() {
        errors.push(violation("dap.probe_rs_command", "must not be empty"));
    }
    if dap.default_port == 0 {
        errors.push(violation("dap.default_port", "must not be 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and collapse the violations into the first one.
pub(crate) fn validate_first(settings: &Settings) -> Result<(), ConfigError> {
    validate(settings).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| violation("unknown", "validation failed"))
    })
}

fn violation(field: &str, message: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}
