//! Configuration file discovery and loading

use std::path::{Path, PathBuf};

use courier_common::internal;

use crate::controller::Courier;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

const DEFAULT_PATHS: [&str; 2] = ["./courier.config.ron", "/etc/courier/courier.config.ron"];

/// Find the configuration file using the following precedence:
/// 1. `explicit`, when given on the command line
/// 2. `COURIER_CONFIG` environment variable
/// 3. ./courier.config.ron (current working directory)
/// 4. /etc/courier/courier.config.ron (system-wide config)
///
/// Returns `Ok(None)` when nothing was requested and no default file exists.
///
/// # Errors
///
/// Returns an error if an explicitly requested file does not exist.
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Read and parse the configuration at `path`
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid RON.
pub fn load_from(path: &Path) -> anyhow::Result<Courier> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
    })?;

    ron::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

/// Locate and load the configuration, falling back to the defaults when no
/// file exists at any of the default locations
///
/// # Errors
///
/// Returns an error if a requested file is missing, unreadable or invalid.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Courier> {
    match find_config_file(explicit)? {
        Some(path) => {
            internal!(level = DEBUG, path = %path.display(), "Loading configuration");
            load_from(&path)
        }
        None => {
            internal!(level = DEBUG, "No configuration file found, using defaults");
            Ok(Courier::default())
        }
    }
}
