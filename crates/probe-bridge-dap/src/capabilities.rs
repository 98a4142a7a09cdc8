//! DAP capabilities tracking.

use crate::protocol::Capabilities;

/// Resolved capabilities of the debug adapter, stored as plain booleans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DapCapabilities {
    /// Whether the adapter supports `configurationDone`.
    pub supports_configuration_done_request: bool,
    /// Whether the adapter supports conditional breakpoints.
    pub supports_conditional_breakpoints: bool,
    /// Whether the adapter supports hit-count breakpoints.
    pub supports_hit_conditional_breakpoints: bool,
    /// Whether the adapter supports `evaluate` for hovers.
    pub supports_evaluate_for_hovers: bool,
    /// Whether the adapter supports stepping backwards.
    pub supports_step_back: bool,
    /// Whether the adapter supports setting variable values.
    pub supports_set_variable: bool,
    /// Whether the adapter supports the `terminate` request.
    pub supports_terminate_request: bool,
    /// Whether the adapter supports `setInstructionBreakpoints`.
    pub supports_instruction_breakpoints: bool,
    /// Whether step requests accept a granularity.
    pub supports_stepping_granularity: bool,
}

impl DapCapabilities {
    /// Build [`DapCapabilities`] from the protocol-level [`Capabilities`]
    /// returned by the adapter in the `initialize` response.
    pub fn from_initialize_response(caps: &Capabilities) -> Self {
        Self {
            supports_configuration_done_request: caps
                .supports_configuration_done_request
                .unwrap_or(false),
            supports_conditional_breakpoints: caps
                .supports_conditional_breakpoints
                .unwrap_or(false),
            supports_hit_conditional_breakpoints: caps
                .supports_hit_conditional_breakpoints
                .unwrap_or(false),
            supports_evaluate_for_hovers: caps.supports_evaluate_for_hovers.unwrap_or(false),
            supports_step_back: caps.supports_step_back.unwrap_or(false),
            supports_set_variable: caps.supports_set_variable.unwrap_or(false),
            supports_terminate_request: caps.supports_terminate_request.unwrap_or(false),
            supports_instruction_breakpoints: caps
                .supports_instruction_breakpoints
                .unwrap_or(false),
            supports_stepping_granularity: caps.supports_stepping_granularity.unwrap_or(false),
        }
    }

    /// Names of the supported features, for display.
    pub fn supported(&self) -> Vec<&'static str> {
        [
            (self.supports_configuration_done_request, "configurationDone"),
            (self.supports_conditional_breakpoints, "conditionalBreakpoints"),
            (self.supports_hit_conditional_breakpoints, "hitConditionalBreakpoints"),
            (self.supports_evaluate_for_hovers, "evaluateForHovers"),
            (self.supports_step_back, "stepBack"),
            (self.supports_set_variable, "setVariable"),
            (self.supports_terminate_request, "terminate"),
            (self.supports_instruction_breakpoints, "instructionBreakpoints"),
            (self.supports_stepping_granularity, "steppingGranularity"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_from_probe_rs_response() {
        let caps: Capabilities = serde_json::from_value(serde_json::json!({
            "supportsConfigurationDoneRequest": true,
            "supportsInstructionBreakpoints": true,
            "supportsSteppingGranularity": true,
            "supportsTerminateRequest": true,
            "supportsDisassembleRequest": true
        }))
        .unwrap();
        let resolved = DapCapabilities::from_initialize_response(&caps);
        assert!(resolved.supports_configuration_done_request);
        assert!(resolved.supports_instruction_breakpoints);
        assert!(resolved.supports_stepping_granularity);
        assert!(resolved.supports_terminate_request);
        assert!(!resolved.supports_step_back);
    }

    #[test]
    fn capabilities_from_empty_response() {
        let resolved = DapCapabilities::from_initialize_response(&Capabilities::default());
        assert_eq!(resolved, DapCapabilities::default());
        assert!(resolved.supported().is_empty());
    }

    #[test]
    fn capabilities_supported_lists_enabled_names() {
        let caps = DapCapabilities {
            supports_configuration_done_request: true,
            supports_instruction_breakpoints: true,
            ..Default::default()
        };
        assert_eq!(caps.supported(), vec!["configurationDone", "instructionBreakpoints"]);
    }
}
