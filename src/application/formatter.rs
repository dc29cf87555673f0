//! Output formatting for exported conversations.
//!
//! Supports the flat CSV export, the hierarchical JSON export, and the
//! terminal views (conversation table and statistics).

use std::io::Write;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{
    AppError, Attachment, Conversation, ConversationStub, ExportStats, Message, Result,
};

/// Column order of the flat export.
pub const FLAT_COLUMNS: [&str; 9] = [
    "message_id",
    "timestamp_local_iso",
    "from_me",
    "sender_identifier",
    "text",
    "service",
    "attachment_name",
    "attachment_mime",
    "attachment_path",
];

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One row per message and attachment.
    Csv,
    /// Conversations containing messages containing attachments.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" | "flat" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: csv, json")),
        }
    }
}

/// One record of the flat export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatRow<'a> {
    pub message_id: i64,
    pub timestamp_local_iso: &'a str,
    pub from_me: u8,
    pub sender_identifier: &'a str,
    pub text: String,
    pub service: &'a str,
    pub attachment_name: &'a str,
    pub attachment_mime: &'a str,
    pub attachment_path: &'a str,
}

/// Flattens a conversation: one row per attachment, or one row for a
/// message without attachments.
#[must_use]
pub fn flat_rows(conv: &Conversation) -> Vec<FlatRow<'_>> {
    let mut rows = Vec::with_capacity(conv.message_count());

    for message in &conv.messages {
        if message.attachments.is_empty() {
            rows.push(flat_row(message, None));
        } else {
            rows.extend(
                message
                    .attachments
                    .iter()
                    .map(|attachment| flat_row(message, Some(attachment))),
            );
        }
    }

    rows
}

fn flat_row<'a>(message: &'a Message, attachment: Option<&'a Attachment>) -> FlatRow<'a> {
    FlatRow {
        message_id: message.id,
        timestamp_local_iso: message.timestamp.as_deref().unwrap_or_default(),
        from_me: u8::from(message.from_me),
        sender_identifier: message.sender.as_deref().unwrap_or_default(),
        text: message.text.replace("\r\n", "\n"),
        service: &message.service,
        attachment_name: attachment.and_then(|a| a.name.as_deref()).unwrap_or_default(),
        attachment_mime: attachment.and_then(|a| a.mime.as_deref()).unwrap_or_default(),
        attachment_path: attachment.and_then(|a| a.path.as_deref()).unwrap_or_default(),
    }
}

/// Writes conversations as CSV with a header row.
///
/// # Errors
/// Returns `OutputWrite` if the writer fails and `Serialize` if a row
/// cannot be encoded.
pub fn write_flat(conversations: &[Conversation], writer: &mut dyn Write) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv.write_record(FLAT_COLUMNS).map_err(csv_error)?;
    for conv in conversations {
        for row in flat_rows(conv) {
            csv.serialize(row).map_err(csv_error)?;
        }
    }
    csv.flush().map_err(AppError::write)
}

/// Writes conversations as pretty-printed JSON.
///
/// # Errors
/// Returns `OutputWrite` if the writer fails and `Serialize` if encoding
/// fails.
pub fn write_json(conversations: &[Conversation], writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, conversations).map_err(json_error)?;
    writer.write_all(b"\n").map_err(AppError::write)
}

fn csv_error(err: csv::Error) -> AppError {
    if !err.is_io_error() {
        return AppError::serialize(err);
    }
    match err.into_kind() {
        csv::ErrorKind::Io(io) => AppError::write(io),
        kind => AppError::serialize(format!("{kind:?}")),
    }
}

fn json_error(err: serde_json::Error) -> AppError {
    if err.is_io() {
        AppError::write(err.into())
    } else {
        AppError::serialize(err)
    }
}

/// Writes conversations in `format`.
///
/// # Errors
/// Returns error if writing fails.
pub fn write_conversations(
    format: OutputFormat,
    conversations: &[Conversation],
    writer: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_flat(conversations, writer),
        OutputFormat::Json => write_json(conversations, writer),
    }
}

/// Formats a numbered table of lookup results.
pub fn format_conversations_table(conversations: &[ConversationStub]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Name", "Identifier", "Participants", "GUID"]);

    for (i, conv) in conversations.iter().enumerate() {
        let name = conv
            .display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Unnamed chat");

        table.add_row(vec![
            &(i + 1).to_string(),
            &truncate(name, 30),
            &truncate(&conv.chat_identifier, 30),
            &conv.participants.join(", "),
            &conv.guid,
        ]);
    }

    table.to_string()
}

/// Formats export statistics for display.
pub fn format_stats(stats: &ExportStats) -> String {
    format!(
        "{}\n  Conversations: {}\n  Messages: {}\n  Attachments: {}\n  Decoded from rich text: {}\n  Undecodable rich text: {}\n  Distinct links: {}",
        "📊 Statistics".bold(),
        stats.conversation_count.to_string().cyan(),
        stats.message_count.to_string().cyan(),
        stats.attachment_count.to_string().green(),
        stats.decoded_messages.to_string().blue(),
        stats.decode_failures.to_string().yellow(),
        stats.unique_urls.to_string().cyan()
    )
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
