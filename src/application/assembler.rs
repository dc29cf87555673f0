//! Assembly of raw store rows into conversations.
//!
//! Converts timestamps, resolves display text and attaches extracted
//! metadata and attachments to each message.

use std::collections::HashMap;

use crate::domain::{Attachment, Conversation, ConversationStub, ExportStats, Message, TextSource};
use crate::infrastructure::{RawAttachment, RawMessage};

use super::content;
use super::epoch;
use super::rich_text::{self, DecodeError};

/// Builds a conversation from its stub, message rows and attachment rows.
///
/// Messages come out ordered by (timestamp, id). Rich-text decode failures
/// are absorbed: the message gets an empty text and the failure is counted.
#[must_use]
pub fn assemble(
    stub: ConversationStub,
    raw_messages: Vec<RawMessage>,
    mut attachments_by_message: HashMap<i64, Vec<RawAttachment>>,
) -> (Conversation, ExportStats) {
    let mut stats = ExportStats {
        conversation_count: 1,
        ..Default::default()
    };

    let mut messages: Vec<Message> = raw_messages
        .into_iter()
        .map(|raw| {
            let attachments = attachments_by_message.remove(&raw.id).unwrap_or_default();
            let assembled = assemble_message(raw, attachments);
            match assembled.message.text_source {
                TextSource::Decoded => stats.decoded_messages += 1,
                TextSource::Empty if assembled.undecodable => stats.decode_failures += 1,
                _ => {}
            }
            assembled.message
        })
        .collect();

    messages.sort_by_key(|m| (m.date, m.id));

    let mut conversation = Conversation::from_stub(stub);
    conversation.messages = messages;

    stats.message_count = conversation.message_count();
    stats.attachment_count = conversation.attachment_count();
    stats.unique_urls = conversation.unique_urls().len();

    (conversation, stats)
}

struct Assembled {
    message: Message,
    /// An archive was present but yielded no text.
    undecodable: bool,
}

fn assemble_message(raw: RawMessage, attachments: Vec<RawAttachment>) -> Assembled {
    let (text, text_source, decode_error) =
        resolve_text(raw.text.as_deref(), raw.attributed_body.as_deref());

    if let Some(err) = decode_error {
        tracing::debug!("Message {}: {}", raw.id, err);
    }

    let extracted = content::extract(&text);
    let timestamp = epoch::to_local_iso(raw.date);

    let message = Message {
        id: raw.id,
        date: raw.date,
        timestamp: (!timestamp.is_empty()).then_some(timestamp),
        from_me: raw.is_from_me,
        sender: if raw.is_from_me { None } else { raw.handle },
        service: raw.service.unwrap_or_default(),
        text,
        text_source,
        item_type: raw.item_type,
        associated_message_guid: raw.associated_message_guid,
        thread_originator_guid: raw.thread_originator_guid,
        urls: extracted.urls,
        mentions: extracted.mentions,
        attachments: attachments.into_iter().map(to_attachment).collect(),
    };

    Assembled {
        message,
        undecodable: decode_error.is_some_and(|e| e != DecodeError::Empty),
    }
}

/// Picks the display text: non-empty raw text, else decoded archive, else empty.
///
/// Non-empty raw text is authoritative even if it is only a placeholder.
#[must_use]
pub fn resolve_text(
    raw_text: Option<&str>,
    attributed_body: Option<&[u8]>,
) -> (String, TextSource, Option<DecodeError>) {
    if let Some(text) = raw_text.filter(|t| !t.is_empty()) {
        return (text.to_string(), TextSource::Raw, None);
    }

    match attributed_body.map(rich_text::decode) {
        Some(Ok(decoded)) => (decoded, TextSource::Decoded, None),
        Some(Err(err)) => (String::new(), TextSource::Empty, Some(err)),
        None => (String::new(), TextSource::Empty, None),
    }
}

fn to_attachment(raw: RawAttachment) -> Attachment {
    Attachment {
        name: raw.transfer_name,
        mime: raw.mime_type,
        path: raw.filename,
    }
}
