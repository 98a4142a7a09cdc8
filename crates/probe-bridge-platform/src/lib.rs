//! probe-bridge-platform: platform directories and log-file handling.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::PlatformError;
pub use logging::{default_log_file_path, log_level_to_filter, open_log_file};
pub use paths::{DefaultPaths, PlatformPaths};
