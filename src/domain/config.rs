//! Application configuration model.
//!
//! Values come from the optional TOML config file; command-line flags take
//! precedence over anything set here.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Location of the Messages database relative to the home directory.
const MESSAGES_DB_PATH: &str = "Library/Messages/chat.db";
/// Location of the attachments directory relative to the home directory.
const ATTACHMENTS_PATH: &str = "Library/Messages/Attachments";

/// Store access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to `chat.db`; the macOS default is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long to wait on a lock held by another process.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

const fn default_busy_timeout_ms() -> u64 {
    2000
}

/// Export output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default file for single-chat exports.
    #[serde(default = "default_csv_file")]
    pub csv_file: PathBuf,

    /// Default file for full exports.
    #[serde(default = "default_json_file")]
    pub json_file: PathBuf,

    /// Root that attachment paths are relative to.
    #[serde(default)]
    pub attachments_root: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_file: default_csv_file(),
            json_file: default_json_file(),
            attachments_root: None,
        }
    }
}

fn default_csv_file() -> PathBuf {
    PathBuf::from("imessage_chat.csv")
}

fn default_json_file() -> PathBuf {
    PathBuf::from("imessage_all.json")
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Resolved store path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| home_dir().join(MESSAGES_DB_PATH))
    }

    /// Resolved attachments root.
    #[must_use]
    pub fn attachments_root(&self) -> PathBuf {
        self.export
            .attachments_root
            .clone()
            .unwrap_or_else(|| home_dir().join(ATTACHMENTS_PATH))
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    /// Default config directory for this tool.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| home_dir().join(".config"))
            .join("imessage-export")
    }

    /// Default config file path.
    #[must_use]
    pub fn default_config_file() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
