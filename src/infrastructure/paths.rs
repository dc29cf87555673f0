//! Path resolution for the Messages store and tool files.

use std::path::{Path, PathBuf};

use crate::domain::AppConfig;

/// A path the tool reads or writes, for display.
#[derive(Debug, Clone)]
pub struct KnownPath {
    pub label: &'static str,
    pub path: PathBuf,
    pub exists: bool,
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

/// Resolves the store path: command-line override first, then configuration.
#[must_use]
pub fn resolve_database_path(cli_override: Option<&Path>, config: &AppConfig) -> PathBuf {
    let path = cli_override.map_or_else(|| config.database_path(), Path::to_path_buf);
    let path = expand_tilde(&path);
    tracing::debug!("Using message store: {}", path.display());
    path
}

/// Lists the database, attachments root and config file locations.
#[must_use]
pub fn known_paths(
    cli_override: Option<&Path>,
    config_file: Option<&Path>,
    config: &AppConfig,
) -> Vec<KnownPath> {
    let config_file = config_file.map_or_else(AppConfig::default_config_file, Path::to_path_buf);

    [
        ("database", resolve_database_path(cli_override, config)),
        ("attachments", expand_tilde(&config.attachments_root())),
        ("config", config_file),
    ]
    .into_iter()
    .map(|(label, path)| KnownPath {
        label,
        exists: path.exists(),
        path,
    })
    .collect()
}
