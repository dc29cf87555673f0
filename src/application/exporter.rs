//! Export orchestration.
//!
//! Runs the pipeline from store queries to assembled conversations, for a
//! single conversation picked by participant or for the whole store.

use std::collections::HashSet;

use crate::domain::{AppError, Conversation, ConversationStub, ExportStats, Result};
use crate::infrastructure::ChatDb;

use super::assembler::assemble;

/// Checks a participant query and returns it trimmed.
///
/// # Errors
/// Returns `InvalidInput` if the query is blank or has no letters or digits.
pub fn validate_participant(participant: &str) -> Result<&str> {
    let trimmed = participant.trim();

    if trimmed.is_empty() {
        return Err(AppError::InvalidInput {
            message: "Participant must not be empty".into(),
        });
    }
    if !trimmed.chars().any(char::is_alphanumeric) {
        return Err(AppError::InvalidInput {
            message: format!("Participant '{trimmed}' must contain a letter or digit"),
        });
    }

    Ok(trimmed)
}

/// Finds the conversations a participant takes part in.
///
/// # Errors
/// Returns `NoMatchingConversation` when nothing matches, or the store error.
pub fn find_conversations(db: &ChatDb, participant: &str) -> Result<Vec<ConversationStub>> {
    let participant = validate_participant(participant)?;
    let found = db.find_conversations(participant)?;

    if found.is_empty() {
        return Err(AppError::NoMatchingConversation {
            participant: participant.to_string(),
        });
    }

    Ok(found)
}

/// Picks one conversation out of the lookup results.
///
/// A single candidate is taken as is. With several, `select` (1-based)
/// chooses one.
///
/// # Errors
/// Returns `NoMatchingConversation` for no candidates, and `InvalidInput`
/// when the choice is missing or out of range.
pub fn select_conversation(
    mut candidates: Vec<ConversationStub>,
    participant: &str,
    select: Option<usize>,
) -> Result<ConversationStub> {
    let count = candidates.len();

    match (count, select) {
        (0, _) => Err(AppError::NoMatchingConversation {
            participant: participant.to_string(),
        }),
        (1, None) => Ok(candidates.remove(0)),
        (_, None) => Err(AppError::InvalidInput {
            message: format!(
                "{count} chats match '{participant}'; pick one with --select <1-{count}>"
            ),
        }),
        (_, Some(n)) if (1..=count).contains(&n) => Ok(candidates.swap_remove(n - 1)),
        (_, Some(n)) => Err(AppError::InvalidInput {
            message: format!("Selection {n} is out of range 1-{count}"),
        }),
    }
}

/// Loads and assembles one conversation.
///
/// # Errors
/// Returns error if the store cannot be queried.
pub fn export_conversation(
    db: &ChatDb,
    stub: ConversationStub,
) -> Result<(Conversation, ExportStats)> {
    tracing::info!("Exporting chat {}", stub.label());

    let messages = db.load_messages(stub.rowid)?;
    let attachments = db.load_attachments_for(messages.iter().map(|m| m.id))?;

    Ok(assemble(stub, messages, attachments))
}

/// Loads and assembles every conversation, most recently active first.
///
/// Conversations without messages come last.
///
/// # Errors
/// Returns error if the store cannot be queried.
pub fn export_all(db: &ChatDb) -> Result<(Vec<Conversation>, ExportStats)> {
    let stubs = db.list_conversations()?;
    tracing::info!("Exporting {} chats from {}", stubs.len(), db.path().display());

    let mut conversations = Vec::with_capacity(stubs.len());
    let mut stats = ExportStats::default();

    for stub in stubs {
        let (conversation, conv_stats) = export_conversation(db, stub)?;
        stats.absorb(&conv_stats);
        conversations.push(conversation);
    }

    conversations.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));

    stats.unique_urls = conversations
        .iter()
        .flat_map(Conversation::unique_urls)
        .collect::<HashSet<_>>()
        .len();

    Ok((conversations, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TextSource;
    use crate::infrastructure::fixtures::{self, Fixture};
    use rusqlite::Connection;

    fn stub(rowid: i64) -> ConversationStub {
        ConversationStub {
            rowid,
            guid: format!("guid-{rowid}"),
            display_name: None,
            chat_identifier: format!("chat{rowid}"),
            participants: Vec::new(),
        }
    }

    #[test]
    fn test_validate_participant() {
        assert_eq!(validate_participant("  +1555 ").unwrap(), "+1555");
        assert_eq!(validate_participant("bob@x.test").unwrap(), "bob@x.test");
        assert!(matches!(
            validate_participant("   "),
            Err(AppError::InvalidInput { .. })
        ));
        assert!(matches!(
            validate_participant("+-()"),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_select_single_candidate() {
        let picked = select_conversation(vec![stub(7)], "x", None).unwrap();
        assert_eq!(picked.rowid, 7);
    }

    #[test]
    fn test_select_among_several() {
        let candidates = || vec![stub(1), stub(2), stub(3)];

        assert_eq!(select_conversation(candidates(), "x", Some(2)).unwrap().rowid, 2);
        assert_eq!(select_conversation(candidates(), "x", Some(3)).unwrap().rowid, 3);
        assert!(matches!(
            select_conversation(candidates(), "x", None),
            Err(AppError::InvalidInput { .. })
        ));
        assert!(matches!(
            select_conversation(candidates(), "x", Some(0)),
            Err(AppError::InvalidInput { .. })
        ));
        assert!(matches!(
            select_conversation(candidates(), "x", Some(4)),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_select_without_candidates() {
        assert!(matches!(
            select_conversation(Vec::new(), "x", Some(1)),
            Err(AppError::NoMatchingConversation { .. })
        ));
    }

    #[test]
    fn test_find_without_match_is_no_matching_conversation() {
        let fixture = Fixture::sample();
        let db = fixture.open();

        let err = find_conversations(&db, "nobody@nowhere").unwrap_err();
        assert!(matches!(err, AppError::NoMatchingConversation { ref participant } if participant == "nobody@nowhere"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_export_direct_conversation() {
        let fixture = Fixture::sample();
        let db = fixture.open();

        let found = find_conversations(&db, "+447700").unwrap();
        let stub = select_conversation(found, "+447700", None).unwrap();
        assert_eq!(stub.guid, fixtures::SMS_GUID);

        let found = find_conversations(&db, "555").unwrap();
        let stub = select_conversation(found, "555", Some(1)).unwrap();
        let (conv, stats) = export_conversation(&db, stub).unwrap();

        assert_eq!(conv.chat_guid, fixtures::DIRECT_GUID);
        let ids: Vec<i64> = conv.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![11, 10, 12, 13]);

        let own = &conv.messages[1];
        assert!(own.from_me);
        assert!(own.sender.is_none());

        let first = &conv.messages[0];
        assert_eq!(first.urls, vec!["https://a.test/x"]);
        assert_eq!(first.mentions, vec!["@bob"]);
        assert_eq!(first.attachments.len(), 2);
        assert_eq!(first.attachments[0].name.as_deref(), Some("photo.jpg"));

        assert_eq!(conv.messages[2].text, "decoded body");
        assert_eq!(conv.messages[2].text_source, TextSource::Decoded);
        assert_eq!(conv.messages[3].text, "");
        assert_eq!(conv.messages[3].attachments.len(), 1);
        assert!(conv.messages[3].attachments[0].name.is_none());

        assert_eq!(stats.message_count, 4);
        assert_eq!(stats.attachment_count, 3);
        assert_eq!(stats.decoded_messages, 1);
        assert_eq!(stats.decode_failures, 1);
    }

    #[test]
    fn test_export_all_orders_by_recent_activity() {
        let fixture = Fixture::sample();
        let db = fixture.open();

        let (conversations, stats) = export_all(&db).unwrap();

        let guids: Vec<&str> = conversations.iter().map(|c| c.chat_guid.as_str()).collect();
        assert_eq!(
            guids,
            vec![
                fixtures::GROUP_GUID,
                fixtures::DIRECT_GUID,
                fixtures::SMS_GUID,
                fixtures::EMPTY_GUID,
            ]
        );
        assert!(conversations[3].messages.is_empty());
        assert!(conversations[2].messages[0].timestamp.is_none());

        assert_eq!(stats.conversation_count, 4);
        assert_eq!(stats.message_count, 6);
        assert_eq!(stats.attachment_count, 3);
        assert_eq!(stats.unique_urls, 1);
    }

    #[test]
    fn test_locked_store_is_not_a_missing_conversation() {
        let fixture = Fixture::sample();
        let db = fixture.open();

        let writer = Connection::open(&fixture.path).unwrap();
        writer.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let err = find_conversations(&db, "555").unwrap_err();
        assert!(matches!(err, AppError::StoreLocked { .. }), "got {err:?}");
        assert!(err.is_retryable());

        let err = export_all(&db).unwrap_err();
        assert!(matches!(err, AppError::StoreLocked { .. }), "got {err:?}");

        writer.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(find_conversations(&db, "555").unwrap().len(), 2);
    }
}
