//! Diagnostics helpers.
//!
//! - **About info**: version, platform, configured backend, log location
//! - **Log rotation helpers**: used by `lib.rs` to configure rolling log files.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Config;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 7;

/// Prefix of the rolling log files (`storefront.2025-03-01`).
pub const LOG_FILE_PREFIX: &str = "storefront";

const APP_DIR: &str = "com.ktl.storefront";

// ---------------------------------------------------------------------------
// About
// ---------------------------------------------------------------------------

pub fn get_about_info(config: &Config) -> Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "apiBaseUrl": config.base_url,
        "trackingIntervalMs": config.tracking_interval.as_millis() as u64,
        "locationPushIntervalMs": config.location_push_interval.as_millis() as u64,
        "logDir": get_log_dir().to_string_lossy(),
    })
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

pub fn get_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join(APP_DIR).join("logs")
}

/// Prune old log files, keeping only the most recent `MAX_LOG_FILES`.
pub fn prune_old_logs() {
    prune_logs_in(&get_log_dir(), MAX_LOG_FILES);
}

fn is_log_file(name: &str) -> bool {
    name == format!("{LOG_FILE_PREFIX}.log") || name.starts_with(&format!("{LOG_FILE_PREFIX}."))
}

fn prune_logs_in(log_dir: &Path, keep: usize) -> usize {
    if !log_dir.exists() {
        return 0;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if is_log_file(name) {
                    let modified = entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .unwrap_or(std::time::UNIX_EPOCH);
                    log_files.push((path, modified));
                }
            }
        }
    }

    // Newest first; ties broken by name so dated files sort predictably.
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}
