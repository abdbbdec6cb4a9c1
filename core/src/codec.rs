//! Wire Codec
//!
//! One request is a single line over the stream socket:
//!
//! ```text
//! cmd \t payload-or-"none" \t screen \t workspace \t startup-id-or-"none" \t timestamp \r\n
//! ```
//!
//! A line-oriented, human-inspectable text frame keeps message boundaries
//! self-delimited over a byte stream and makes the protocol debuggable
//! with nothing more than `socat`. Payload bytes are backslash-escaped so
//! tabs and newlines inside the payload cannot corrupt the framing; the
//! escape is fully reversible and keeps frames 7-bit clean.
//!
//! Absent payload and absent startup-id are carried as the sentinel
//! `none`, which decodes back to absent. An explicit empty string escapes
//! to an empty field and is preserved as such.

use thiserror::Error;

use crate::message::MessageData;

/// Frame terminator for both requests and responses.
pub const LINE_TERM: &str = "\r\n";

/// Sentinel for absent payload / absent startup-id.
const NONE_SENTINEL: &str = "none";

/// Number of tab-separated fields in a request frame.
const FIELD_COUNT: usize = 6;

/// A framing or parsing failure. The connection that produced it is
/// dropped without a reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The frame did not carry exactly six tab-separated fields.
    #[error("malformed frame: expected {FIELD_COUNT} fields, found {0}")]
    FieldCount(usize),

    /// A numeric field did not parse.
    #[error("malformed frame: field `{0}` is not a valid number")]
    BadNumber(&'static str),
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Escaped-and-recovered command name (mapping it to an id is the
    /// receiver's business).
    pub command: String,
    /// Payload bytes, or `None` if the sender attached no payload.
    pub payload: Option<Vec<u8>>,
    /// Screen number the sender originated from.
    pub screen: u32,
    /// Workspace number, -1 when unknown.
    pub workspace: i32,
    /// Startup-notification token, if the sender carried one.
    pub startup_id: Option<String>,
    /// Seconds since the epoch, stamped by the sender.
    pub timestamp: u64,
}

/// Backslash-escape `input` so it contains no control bytes, tabs,
/// backslashes or non-ASCII bytes.
///
/// Mirrors GLib's `g_strescape`: the usual C escapes for `\b \f \n \r
/// \t \v \" \\`, and three-digit octal for every other byte outside
/// `0x20..=0x7e`.
#[must_use]
pub fn escape(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input {
        match b {
            0x08 => out.push_str("\\b"),
            0x0c => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x0b => out.push_str("\\v"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => {
                out.push('\\');
                out.push_str(&format!("{b:03o}"));
            }
        }
    }
    out
}

/// Reverse [`escape`].
///
/// Mirrors GLib's `g_strcompress`: `\` followed by one to three octal
/// digits yields that byte; the named C escapes yield their control
/// byte; any other escaped character is passed through literally. A
/// trailing lone backslash is dropped.
#[must_use]
pub fn unescape(input: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.bytes().peekable();

    while let Some(b) = chars.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }

        match chars.next() {
            None => {
                tracing::warn!("trailing backslash in escaped frame field");
                break;
            }
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(n - b'0');
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            Some(b'b') => out.push(0x08),
            Some(b'f') => out.push(0x0c),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'v') => out.push(0x0b),
            Some(other) => out.push(other),
        }
    }

    out
}

/// Serialize one request frame, terminator included.
///
/// The caller resolves the command id to its name beforehand; a message
/// with no resolvable name must never reach the wire.
#[must_use]
pub fn pack(command_name: &str, data: &MessageData, timestamp: u64) -> Vec<u8> {
    let payload_field = match data.data() {
        Some(payload) => escape(payload),
        None => NONE_SENTINEL.to_owned(),
    };
    let startup_field = match data.startup_id() {
        Some(id) => escape(id.as_bytes()),
        None => NONE_SENTINEL.to_owned(),
    };

    let mut frame = String::new();
    frame.push_str(&escape(command_name.as_bytes()));
    frame.push('\t');
    frame.push_str(&payload_field);
    frame.push('\t');
    frame.push_str(&data.screen().to_string());
    frame.push('\t');
    frame.push_str(&data.workspace().to_string());
    frame.push('\t');
    frame.push_str(&startup_field);
    frame.push('\t');
    frame.push_str(&timestamp.to_string());
    frame.push_str(LINE_TERM);

    frame.into_bytes()
}

/// Parse one request line (terminator already stripped).
///
/// # Errors
///
/// Returns [`CodecError`] if the line does not carry exactly six fields
/// or a numeric field fails to parse. On error nothing is partially
/// populated; the caller drops the connection.
pub fn unpack(line: &[u8]) -> Result<Frame, CodecError> {
    let fields: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();
    if fields.len() != FIELD_COUNT {
        return Err(CodecError::FieldCount(fields.len()));
    }

    // Escaped fields are 7-bit clean, so lossy conversion only mangles
    // frames that were already malformed.
    let field_str =
        |idx: usize| -> String { String::from_utf8_lossy(fields[idx]).into_owned() };

    let command = String::from_utf8_lossy(&unescape(&field_str(0))).into_owned();

    let payload = if fields[1] == NONE_SENTINEL.as_bytes() {
        None
    } else {
        Some(unescape(&field_str(1)))
    };

    let screen: u32 = field_str(2)
        .parse()
        .map_err(|_| CodecError::BadNumber("screen"))?;
    let workspace: i32 = field_str(3)
        .parse()
        .map_err(|_| CodecError::BadNumber("workspace"))?;

    let startup_id = if fields[4] == NONE_SENTINEL.as_bytes() {
        None
    } else {
        Some(String::from_utf8_lossy(&unescape(&field_str(4))).into_owned())
    };

    let timestamp: u64 = field_str(5)
        .parse()
        .map_err(|_| CodecError::BadNumber("timestamp"))?;

    Ok(Frame {
        command,
        payload,
        screen,
        workspace,
        startup_id,
        timestamp,
    })
}
