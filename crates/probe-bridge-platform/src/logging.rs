//! Log-file helpers for the bridge binary.
//!
//! The `tracing-subscriber` setup itself lives in the binary crate; this
//! module only decides where the log goes, keeps it from growing without
//! bound, and maps configured level names onto filter directives.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::PlatformError;
use crate::paths::PlatformPaths;

/// File name of the active log inside the log directory.
pub const LOG_FILE_NAME: &str = "probe-bridge.log";

/// Size at which the active log is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated files kept next to the active log.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Log file location for the given platform paths.
pub fn default_log_file_path(paths: &dyn PlatformPaths) -> PathBuf {
    paths.log_dir().join(LOG_FILE_NAME)
}

/// Rotate `log_path` when it has reached `max_size` bytes.
///
/// `probe-bridge.log` becomes `probe-bridge.log.1`, `.1` becomes `.2` and so
/// on; whatever sits at `.<max_files>` is deleted first. Missing or small
/// files are left alone.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> Result<(), PlatformError> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if size < max_size || max_files == 0 {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..max_files).rev() {
        let from = rotated_path(log_path, index);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, index + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))?;
    tracing::debug!(path = %log_path.display(), size, "rotated log file");
    Ok(())
}

/// Create the log directory, rotate if needed and open the log for append.
pub fn open_log_file(log_path: &Path) -> Result<File, PlatformError> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    rotate_log_files(log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    Ok(file)
}

/// Map a level name (any case) to a `tracing` filter directive.
///
/// Unknown names fall back to `"info"`.
pub fn log_level_to_filter(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}
