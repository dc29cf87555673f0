//! Configuration file management.
//!
//! Handles loading the optional TOML configuration file.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# imessage-export configuration
# Auto-generated - edit as needed

[database]
# Path to the Messages database (defaults to ~/Library/Messages/chat.db)
# path = "/Users/me/Library/Messages/chat.db"

# How long to wait for the Messages app to release a lock, in milliseconds
busy_timeout_ms = 2000

[export]
# Default output file for export-chat
csv_file = "imessage_chat.csv"

# Default output file for export-all
json_file = "imessage_all.json"

# Directory attachment paths are relative to
# attachments_root = "/Users/me/Library/Messages/Attachments"
"#;

/// Load configuration from `explicit`, or the default location, or defaults.
///
/// An explicitly given file must exist; the default one is optional.
///
/// # Errors
/// Returns error if a config file exists but cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    let config_path = AppConfig::default_config_file();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!("No config file at {}, using defaults", config_path.display());
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path).map_err(|e| AppError::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file {}: {e}", path.display()),
    })
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns whether a file was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::output(parent, e))?;
    }

    fs::write(config_path, DEFAULT_CONFIG).map_err(|e| AppError::output(config_path, e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");

    Ok(true)
}

/// Renders a configuration as TOML.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })
}
