//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;

/// iMessage Export - Export conversations from the macOS Messages database.
///
/// Reads ~/Library/Messages/chat.db read-only; the terminal needs Full Disk Access.
#[derive(Parser, Debug)]
#[command(name = "imessage-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to chat.db (overrides the config file).
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to the configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List chats with a participant, without loading messages.
    ListChats {
        /// Phone number or email (substring, case-insensitive).
        participant: String,
    },

    /// Export one chat with a participant.
    ExportChat {
        /// Phone number or email (substring, case-insensitive).
        participant: String,

        /// Output file path ("-" for stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv or json.
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Which chat to export when several match (1-based, see list-chats).
        #[arg(short, long)]
        select: Option<usize>,
    },

    /// Export every chat.
    ExportAll {
        /// Output file path ("-" for stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json or csv.
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Show the paths being used.
    Paths,

    /// Show the effective configuration.
    Config {
        /// Write the default config file if it does not exist.
        #[arg(long)]
        init: bool,
    },
}

/// Parse an output format argument.
pub fn parse_format(format: &str) -> Result<OutputFormat, String> {
    format.parse()
}
