//! Plain-text recovery from the `attributedBody` rich-text archive.
//!
//! Messages written by newer clients often leave the `text` column empty and
//! store the body only as an archived attributed string. The decoder reads
//! just enough of the archive structure to find the string the attributed
//! string wraps. Attribute values (mention handles, part GUIDs) are strings
//! too, so picking by position matters. When that structure is damaged the
//! longest plausible string leaf is used instead, which keeps truncated
//! archives usable.
//!
//! Two container layouts are recognised:
//!
//! - **typedstream** (`streamtyped` header): every string leaf is a `+` byte
//!   followed by a length prefix (`< 0x80` inline, `0x81` + u16 LE,
//!   `0x82` + u32 LE) and the UTF-8 bytes. The body is the first leaf after
//!   the root `NSString` class record.
//! - **binary plist** (`bplist00` header, keyed archive): the body is
//!   `$objects[$top.root]["NS.string"]`. A damaged trailer falls back to the
//!   typedstream scan.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const STRING_MARKER: u8 = b'+';
const LEN_U16: u8 = 0x81;
const LEN_U32: u8 = 0x82;

const BPLIST_MAGIC: &[u8] = b"bplist00";
const BPLIST_TRAILER_LEN: usize = 32;
const BPLIST_ASCII: u8 = 0x5;
const BPLIST_UTF16: u8 = 0x6;
const BPLIST_INT: u8 = 0x1;
const BPLIST_UID: u8 = 0x8;
const BPLIST_ARRAY: u8 = 0xA;
const BPLIST_DICT: u8 = 0xD;

/// Class records that open the root string of a typedstream archive.
const STRING_CLASSES: &[&[u8]] = &[b"\x08NSString", b"\x0fNSMutableString"];

/// Placeholder the archive puts where an inline attachment sits.
const OBJECT_REPLACEMENT: char = '\u{FFFC}';

/// Class names and archiver keys that are never user content.
const ARCHIVE_TOKENS: &[&str] = &[
    "streamtyped",
    "NSObject",
    "NSString",
    "NSMutableString",
    "NSAttributedString",
    "NSMutableAttributedString",
    "NSDictionary",
    "NSMutableDictionary",
    "NSArray",
    "NSMutableArray",
    "NSNumber",
    "NSValue",
    "NSData",
    "NSMutableData",
    "NSDate",
    "NSURL",
    "NSUUID",
    "NSColor",
    "NSFont",
    "NSParagraphStyle",
    "NSAttributes",
    "NSAttributeInfo",
    "NSKeyedArchiver",
    "$null",
    "$class",
    "$classes",
    "$classname",
    "$objects",
    "$archiver",
    "$top",
    "$version",
];

/// Why an archive produced no text.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("attributed body is empty")]
    Empty,
    #[error("no text runs found in attributed body")]
    NoStringRuns,
}

/// Recovers the message body from a rich-text archive.
///
/// Never returns an empty string: an archive without usable text is an error.
///
/// # Errors
/// Returns [`DecodeError::Empty`] for an empty blob and
/// [`DecodeError::NoStringRuns`] when no plausible text run exists.
pub fn decode(blob: &[u8]) -> Result<String, DecodeError> {
    if blob.is_empty() {
        return Err(DecodeError::Empty);
    }

    let text = if blob.starts_with(BPLIST_MAGIC) {
        Bplist::parse(blob).map_or_else(|| typedstream_text(blob), |plist| plist.text())
    } else {
        typedstream_text(blob)
    };

    text.ok_or(DecodeError::NoStringRuns)
}

/// First run after the root string class, else the longest run anywhere.
fn typedstream_text(blob: &[u8]) -> Option<String> {
    root_string_start(blob)
        .and_then(|at| typedstream_runs(blob, at).into_iter().next())
        .or_else(|| longest(typedstream_runs(blob, 0)))
}

/// Offset just past the first `NSString`/`NSMutableString` class record.
fn root_string_start(blob: &[u8]) -> Option<usize> {
    STRING_CLASSES
        .iter()
        .filter_map(|class| {
            blob.windows(class.len())
                .position(|window| window == *class)
                .map(|at| at + class.len())
        })
        .min()
}

/// Longest candidate, the earlier one on a tie.
fn longest(candidates: impl IntoIterator<Item = String>) -> Option<String> {
    candidates
        .into_iter()
        .fold(None::<String>, |best, candidate| match best {
            Some(b) if b.chars().count() >= candidate.chars().count() => Some(b),
            _ => Some(candidate),
        })
}

/// Collects cleaned `+`-prefixed string runs from `from` on, in archive order.
fn typedstream_runs(blob: &[u8], from: usize) -> Vec<String> {
    let mut runs = Vec::new();
    let mut i = from;

    while i < blob.len() {
        if blob[i] != STRING_MARKER {
            i += 1;
            continue;
        }

        let Some((len, start)) = read_length(blob, i + 1) else {
            i += 1;
            continue;
        };
        if len == 0 || start >= blob.len() {
            i += 1;
            continue;
        }

        // A declared length past the end means a truncated archive.
        let end = start.saturating_add(len).min(blob.len());
        match clean(&String::from_utf8_lossy(&blob[start..end])) {
            Some(text) => {
                runs.push(text);
                i = end;
            }
            None => i += 1,
        }
    }

    runs
}

/// Reads a typedstream length prefix at `at`, returning `(length, data_start)`.
fn read_length(blob: &[u8], at: usize) -> Option<(usize, usize)> {
    match *blob.get(at)? {
        LEN_U16 => {
            let b = blob.get(at + 1..at + 3)?;
            Some((usize::from(u16::from_le_bytes([b[0], b[1]])), at + 3))
        }
        LEN_U32 => {
            let b = blob.get(at + 1..at + 5)?;
            let len = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            Some((usize::try_from(len).ok()?, at + 5))
        }
        n if n < 0x80 => Some((usize::from(n), at + 1)),
        _ => None,
    }
}

/// Read-only view of a binary plist's object table.
struct Bplist<'a> {
    blob: &'a [u8],
    offset_size: usize,
    ref_size: usize,
    num_objects: usize,
    top_object: usize,
    table_offset: usize,
}

impl<'a> Bplist<'a> {
    /// Reads the trailer; `None` when it is unusable.
    fn parse(blob: &'a [u8]) -> Option<Self> {
        let trailer = blob.get(blob.len().checked_sub(BPLIST_TRAILER_LEN)?..)?;
        let plist = Self {
            blob,
            offset_size: usize::from(trailer[6]),
            ref_size: usize::from(trailer[7]),
            num_objects: be_uint(&trailer[8..16])?,
            top_object: be_uint(&trailer[16..24])?,
            table_offset: be_uint(&trailer[24..32])?,
        };

        let valid = (1..=8).contains(&plist.offset_size)
            && (1..=8).contains(&plist.ref_size)
            && plist.num_objects <= blob.len();
        valid.then_some(plist)
    }

    /// The archived string's body, else the longest string object.
    fn text(&self) -> Option<String> {
        self.root_string()
            .and_then(|root| clean(&root))
            .or_else(|| {
                longest(
                    (0..self.num_objects)
                        .filter_map(|object| self.string(object))
                        .filter_map(|s| clean(&s)),
                )
            })
    }

    /// Follows `$top.root` to the root object's `NS.string`.
    fn root_string(&self) -> Option<String> {
        let objects = self.dict_get(self.top_object, "$objects")?;
        let top = self.dict_get(self.top_object, "$top")?;
        let root = self.array_get(objects, self.uid(self.dict_get(top, "root")?)?)?;
        let string = self.uid(self.dict_get(root, "NS.string")?)?;
        self.string(self.array_get(objects, string)?)
    }

    fn offset(&self, object: usize) -> Option<usize> {
        if object >= self.num_objects {
            return None;
        }
        let at = self
            .table_offset
            .checked_add(object.checked_mul(self.offset_size)?)?;
        be_uint(self.blob.get(at..at.checked_add(self.offset_size)?)?)
    }

    /// Object kind, element count and data start.
    fn header(&self, object: usize) -> Option<(u8, usize, usize)> {
        let offset = self.offset(object)?;
        let marker = *self.blob.get(offset)?;
        let (kind, low) = (marker >> 4, marker & 0x0F);

        let (count, start) = if low == 0x0F {
            let int_marker = *self.blob.get(offset + 1)?;
            if int_marker >> 4 != BPLIST_INT {
                return None;
            }
            let width = 1_usize.checked_shl(u32::from(int_marker & 0x0F))?;
            let count = be_uint(self.blob.get(offset + 2..(offset + 2).checked_add(width)?)?)?;
            (count, offset + 2 + width)
        } else {
            (usize::from(low), offset + 1)
        };

        (count <= self.blob.len()).then_some((kind, count, start))
    }

    fn reference(&self, collection_start: usize, index: usize) -> Option<usize> {
        let at = collection_start.checked_add(index.checked_mul(self.ref_size)?)?;
        be_uint(self.blob.get(at..at.checked_add(self.ref_size)?)?)
    }

    /// Decodes the object if it is an ASCII or UTF-16 string.
    fn string(&self, object: usize) -> Option<String> {
        let (kind, count, start) = self.header(object)?;
        match kind {
            BPLIST_ASCII => {
                let bytes = self.blob.get(start..start.checked_add(count)?)?;
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
            BPLIST_UTF16 => {
                let bytes = self.blob.get(start..start.checked_add(count.checked_mul(2)?)?)?;
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
                Some(
                    char::decode_utf16(units)
                        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Value reference stored under `key` in a dictionary object.
    fn dict_get(&self, object: usize, key: &str) -> Option<usize> {
        let (kind, count, start) = self.header(object)?;
        if kind != BPLIST_DICT {
            return None;
        }
        (0..count).find_map(|i| {
            let key_ref = self.reference(start, i)?;
            if self.string(key_ref)? == key {
                self.reference(start, count + i)
            } else {
                None
            }
        })
    }

    /// Element reference at `index` in an array object.
    fn array_get(&self, object: usize, index: usize) -> Option<usize> {
        let (kind, count, start) = self.header(object)?;
        if kind != BPLIST_ARRAY || index >= count {
            return None;
        }
        self.reference(start, index)
    }

    /// Value of a keyed-archive UID object.
    fn uid(&self, object: usize) -> Option<usize> {
        let offset = self.offset(object)?;
        let marker = *self.blob.get(offset)?;
        if marker >> 4 != BPLIST_UID {
            return None;
        }
        let width = usize::from(marker & 0x0F) + 1;
        be_uint(self.blob.get(offset + 1..(offset + 1).checked_add(width)?)?)
    }
}

/// Big-endian unsigned integer of up to eight bytes.
fn be_uint(bytes: &[u8]) -> Option<usize> {
    if bytes.len() > 8 {
        return None;
    }
    let value = bytes
        .iter()
        .fold(0_u64, |acc, &b| (acc << 8) | u64::from(b));
    usize::try_from(value).ok()
}

/// Normalizes a raw run, or rejects it as non-content.
fn clean(raw: &str) -> Option<String> {
    let invalid = raw
        .chars()
        .filter(|&c| c == char::REPLACEMENT_CHARACTER)
        .count();
    let text: String = raw.chars().filter(|&c| is_content_char(c)).collect();

    let trimmed = text.trim();
    if trimmed.is_empty()
        || invalid > text.chars().count()
        || is_archive_token(trimmed)
        || is_identifier(trimmed)
    {
        return None;
    }

    Some(text)
}

fn is_content_char(c: char) -> bool {
    match c {
        '\n' | '\t' => true,
        char::REPLACEMENT_CHARACTER | OBJECT_REPLACEMENT => false,
        c => !c.is_control(),
    }
}

fn is_archive_token(s: &str) -> bool {
    ARCHIVE_TOKENS.contains(&s) || s.starts_with("__kIM") || s.starts_with("NS.")
}

/// Attachment and message GUIDs stored as attribute values.
fn is_identifier(s: &str) -> bool {
    static GUID: OnceLock<Option<Regex>> = OnceLock::new();
    GUID.get_or_init(|| {
        Regex::new(
            r"^(?:[A-Za-z]+_\d+_)?[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$",
        )
        .map_err(|e| tracing::warn!("GUID pattern failed to compile, identifiers not filtered: {e}"))
        .ok()
    })
    .as_ref()
    .is_some_and(|re| re.is_match(s))
}
