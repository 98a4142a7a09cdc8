//! probe-bridge-config: bridge settings and probe-rs debug configurations.

pub mod adapter_binary;
pub mod debug_config;
pub mod env;
pub mod error;
pub mod load;
pub mod merge;
pub mod scenario;
pub mod server;
pub mod settings;
pub mod validate;

pub use adapter_binary::AdapterBinary;
pub use debug_config::{
    verify_adapter_name, CoreConfig, DebugConfig, FlashingConfig, RequestKind, ADAPTER_NAME,
};
pub use error::ConfigError;
pub use load::{load_settings, settings_from_str};
pub use scenario::{AttachRequest, DebugScenario, LaunchRequest, ScenarioRequest};
pub use server::ServerAddress;
pub use settings::{DapSettings, LogLevel, LogSettings, Settings};
