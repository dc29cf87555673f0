//! Messages-shaped `SQLite` databases for tests.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{params, Connection};
use tempfile::TempDir;

use super::ChatDb;

pub const DIRECT_CHAT: i64 = 1;
pub const GROUP_CHAT: i64 = 2;
pub const SMS_CHAT: i64 = 3;

pub const DIRECT_GUID: &str = "iMessage;-;+15551234567";
pub const GROUP_GUID: &str = "iMessage;+;chat100200300";
pub const SMS_GUID: &str = "SMS;-;+447700900123";
pub const EMPTY_GUID: &str = "iMessage;-;orphan";

/// Store timestamps are nanoseconds; one second is this many units.
pub const SECOND: i64 = 1_000_000_000;
/// 2023-06-15T12:30:45Z in store time.
pub const BASE_DATE: i64 = 708_525_045 * SECOND;

const SCHEMA: &str = r"
    CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT NOT NULL);
    CREATE TABLE chat (
        ROWID INTEGER PRIMARY KEY,
        guid TEXT NOT NULL,
        chat_identifier TEXT,
        display_name TEXT
    );
    CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
    CREATE TABLE message (
        ROWID INTEGER PRIMARY KEY,
        text TEXT,
        attributedBody BLOB,
        is_from_me INTEGER DEFAULT 0,
        handle_id INTEGER DEFAULT 0,
        service TEXT,
        date INTEGER,
        item_type INTEGER DEFAULT 0,
        associated_message_guid TEXT,
        thread_originator_guid TEXT
    );
    CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
    CREATE TABLE attachment (
        ROWID INTEGER PRIMARY KEY,
        filename TEXT,
        transfer_name TEXT,
        mime_type TEXT
    );
    CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);
";

/// A typedstream archive whose only text leaf is "decoded body".
pub const DECODABLE_BODY: &[u8] =
    b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84\x08NSString\x01\x94\x84\x01+\x0cdecoded body\x86";
/// An archive with class metadata only.
pub const UNDECODABLE_BODY: &[u8] =
    b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84\x12NSAttributedString\x00\x85";

/// Message row to insert.
#[derive(Debug, Clone, Default)]
pub struct MessageRow<'a> {
    pub id: i64,
    pub date: i64,
    pub from_me: bool,
    pub handle_id: i64,
    pub text: Option<&'a str>,
    pub body: Option<&'a [u8]>,
    pub item_type: i64,
    pub associated: Option<&'a str>,
    pub thread_originator: Option<&'a str>,
}

/// A temporary on-disk store.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    /// Creates an empty store with the Messages schema.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(SCHEMA)
            .unwrap();
        Self { _dir: dir, path }
    }

    /// Creates a store with a direct chat, a named group, an SMS chat and a
    /// chat without participants.
    pub fn sample() -> Self {
        let fixture = Self::empty();
        let conn = fixture.connect();

        for (rowid, id) in [
            (1, "+15551234567"),
            (2, "alice@example.com"),
            (3, "+447700900123"),
        ] {
            conn.execute("INSERT INTO handle (ROWID, id) VALUES (?1, ?2)", params![rowid, id])
                .unwrap();
        }

        insert_chat(&conn, DIRECT_CHAT, DIRECT_GUID, "+15551234567", None, &[1]);
        insert_chat(&conn, GROUP_CHAT, GROUP_GUID, "chat100200300", Some("Family"), &[1, 2]);
        insert_chat(&conn, SMS_CHAT, SMS_GUID, "+447700900123", None, &[3]);
        insert_chat(&conn, 4, EMPTY_GUID, "orphan", None, &[]);

        insert_message(
            &conn,
            DIRECT_CHAT,
            "iMessage",
            &MessageRow {
                id: 10,
                date: BASE_DATE + 2 * SECOND,
                from_me: true,
                handle_id: 1,
                text: Some("second"),
                ..Default::default()
            },
        );
        insert_message(
            &conn,
            DIRECT_CHAT,
            "iMessage",
            &MessageRow {
                id: 11,
                date: BASE_DATE + SECOND,
                handle_id: 1,
                text: Some("first https://a.test/x and @bob"),
                ..Default::default()
            },
        );
        insert_message(
            &conn,
            DIRECT_CHAT,
            "iMessage",
            &MessageRow {
                id: 12,
                date: BASE_DATE + 2 * SECOND,
                handle_id: 1,
                body: Some(DECODABLE_BODY),
                thread_originator: Some("msg-guid-11"),
                ..Default::default()
            },
        );
        insert_message(
            &conn,
            DIRECT_CHAT,
            "iMessage",
            &MessageRow {
                id: 13,
                date: BASE_DATE + 3 * SECOND,
                handle_id: 1,
                text: Some(""),
                body: Some(UNDECODABLE_BODY),
                item_type: 0,
                associated: Some("p:0/msg-guid-11"),
                ..Default::default()
            },
        );
        insert_message(
            &conn,
            GROUP_CHAT,
            "iMessage",
            &MessageRow {
                id: 20,
                date: BASE_DATE + 100 * SECOND,
                from_me: true,
                text: Some("hi family\r\nsee https://a.test/x"),
                ..Default::default()
            },
        );
        insert_message(
            &conn,
            SMS_CHAT,
            "SMS",
            &MessageRow {
                id: 30,
                date: 0,
                handle_id: 3,
                text: Some("old sms"),
                ..Default::default()
            },
        );

        insert_attachment(&conn, 11, 1, Some("photo.jpg"), Some("image/jpeg"), Some("~/Library/Messages/Attachments/ab/01/photo.jpg"));
        insert_attachment(&conn, 11, 2, Some("clip.mov"), Some("video/quicktime"), Some("~/Library/Messages/Attachments/cd/02/clip.mov"));
        insert_attachment(&conn, 13, 3, None, None, None);

        fixture
    }

    /// Read-write connection for extra setup.
    pub fn connect(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    /// Opens the store the way the exporter does.
    pub fn open(&self) -> ChatDb {
        ChatDb::open(&self.path, Duration::from_millis(100)).unwrap()
    }
}

pub fn insert_chat(
    conn: &Connection,
    rowid: i64,
    guid: &str,
    identifier: &str,
    display_name: Option<&str>,
    handles: &[i64],
) {
    conn.execute(
        "INSERT INTO chat (ROWID, guid, chat_identifier, display_name) VALUES (?1, ?2, ?3, ?4)",
        params![rowid, guid, identifier, display_name],
    )
    .unwrap();
    for handle in handles {
        conn.execute(
            "INSERT INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
            params![rowid, handle],
        )
        .unwrap();
    }
}

pub fn insert_message(conn: &Connection, chat: i64, service: &str, row: &MessageRow<'_>) {
    conn.execute(
        "INSERT INTO message (ROWID, text, attributedBody, is_from_me, handle_id, service, date,
                              item_type, associated_message_guid, thread_originator_guid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.id,
            row.text,
            row.body,
            i64::from(row.from_me),
            row.handle_id,
            service,
            row.date,
            row.item_type,
            row.associated,
            row.thread_originator
        ],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
        params![chat, row.id],
    )
    .unwrap();
}

pub fn insert_attachment(
    conn: &Connection,
    message_id: i64,
    rowid: i64,
    name: Option<&str>,
    mime: Option<&str>,
    path: Option<&str>,
) {
    conn.execute(
        "INSERT INTO attachment (ROWID, filename, transfer_name, mime_type) VALUES (?1, ?2, ?3, ?4)",
        params![rowid, path, name, mime],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
        params![message_id, rowid],
    )
    .unwrap();
}
