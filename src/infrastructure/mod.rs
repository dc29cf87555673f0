//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod chat_db;
pub mod config;
pub mod output;
pub mod paths;

#[cfg(test)]
pub mod fixtures;

pub use chat_db::{ChatDb, RawAttachment, RawMessage};
pub use config::{ensure_config_exists, load_config, render_config};
pub use output::{write_output, STDOUT_PATH};
pub use paths::{known_paths, resolve_database_path};
