//! Domain models for exported message history.
//!
//! These models represent conversations after they have been read from the
//! Messages `SQLite` store and normalized. Field names of the serialized forms
//! are the keys of the hierarchical export.

use serde::Serialize;

/// Where a message's display text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSource {
    /// The plain `text` column.
    Raw,
    /// Decoded from the rich-text `attributedBody` archive.
    Decoded,
    /// Neither yielded text.
    #[default]
    Empty,
}

/// A file attached to a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Original file name as transferred.
    pub name: Option<String>,
    /// MIME type reported by the store.
    pub mime: Option<String>,
    /// Storage path relative to the attachments root.
    pub path: Option<String>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Store-native message id.
    pub id: i64,
    /// Raw store timestamp (nanoseconds since 2001-01-01 UTC).
    #[serde(skip)]
    pub date: i64,
    /// Local ISO-8601 timestamp, `None` when the store value is unset.
    pub timestamp: Option<String>,
    /// Whether the export owner authored the message.
    pub from_me: bool,
    /// Counterpart identifier; always `None` for own messages.
    pub sender: Option<String>,
    /// Service label such as `iMessage` or `SMS`.
    pub service: String,
    /// Effective display text, never null.
    pub text: String,
    #[serde(skip)]
    pub text_source: TextSource,
    /// Message / reaction / system event code.
    pub item_type: i64,
    /// Target of a reaction or edit.
    pub associated_message_guid: Option<String>,
    /// Root of a reply thread.
    pub thread_originator_guid: Option<String>,
    /// URLs found in the text, in order of appearance.
    pub urls: Vec<String>,
    /// `@mentions` found in the text, in order of appearance.
    pub mentions: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// A conversation as returned by participant lookup, before messages are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationStub {
    /// Store row id, used to load messages.
    #[serde(skip)]
    pub rowid: i64,
    pub guid: String,
    pub display_name: Option<String>,
    pub chat_identifier: String,
    pub participants: Vec<String>,
}

impl ConversationStub {
    /// Human-readable label: display name for named groups, identifier otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.chat_identifier)
    }
}

/// A fully assembled conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    /// Globally unique chat identifier.
    pub chat_guid: String,
    /// Name of a named group chat.
    pub display_name: Option<String>,
    /// Short internal identifier (phone number, e-mail or group id).
    pub chat_identifier: String,
    pub participants: Vec<String>,
    /// Messages in (timestamp, id) ascending order.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation from a lookup stub.
    #[must_use]
    pub fn from_stub(stub: ConversationStub) -> Self {
        Self {
            chat_guid: stub.guid,
            display_name: stub.display_name,
            chat_identifier: stub.chat_identifier,
            participants: stub.participants,
            messages: Vec::new(),
        }
    }

    /// Raw timestamp of the most recent message.
    #[must_use]
    pub fn last_activity(&self) -> Option<i64> {
        self.messages.last().map(|m| m.date)
    }

    /// Get total message count.
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Get total attachment count.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.messages.iter().map(|m| m.attachments.len()).sum()
    }

    /// Distinct URLs shared in this conversation, first occurrence first.
    #[must_use]
    pub fn unique_urls(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.messages
            .iter()
            .flat_map(|m| m.urls.iter())
            .map(String::as_str)
            .filter(|url| seen.insert(*url))
            .collect()
    }
}

/// Summary statistics for an export run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportStats {
    /// Number of conversations exported.
    pub conversation_count: usize,
    /// Total number of messages.
    pub message_count: usize,
    /// Total number of attachments.
    pub attachment_count: usize,
    /// Messages whose text was recovered from the rich-text archive.
    pub decoded_messages: usize,
    /// Messages whose archive could not be decoded.
    pub decode_failures: usize,
    /// Distinct URLs across the export.
    pub unique_urls: usize,
}

impl ExportStats {
    /// Folds another set of counts into this one.
    pub fn absorb(&mut self, other: &Self) {
        self.conversation_count += other.conversation_count;
        self.message_count += other.message_count;
        self.attachment_count += other.attachment_count;
        self.decoded_messages += other.decoded_messages;
        self.decode_failures += other.decode_failures;
    }
}
