//! Application layer - use cases and orchestration.
//!
//! This layer turns raw store rows into conversations and renders them
//! in the export formats.

pub mod assembler;
pub mod content;
pub mod epoch;
pub mod exporter;
pub mod formatter;
pub mod rich_text;

pub use exporter::{
    export_all, export_conversation, find_conversations, select_conversation,
    validate_participant,
};
pub use formatter::{
    format_conversations_table, format_stats, write_conversations, OutputFormat,
};
