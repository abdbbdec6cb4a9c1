//! Message Container
//!
//! [`MessageData`] is what a redundant instance hands to the running one:
//! an arbitrary binary payload plus the origin metadata (screen,
//! workspace, startup-notification id) the receiver needs to present
//! itself on the right screen with focus-stealing prevention intact.
//!
//! The payload is raw bytes; [`MessageData::set_text`],
//! [`MessageData::set_uris`] and [`MessageData::set_filename`] layer the
//! common conventions on top. Text is carried CRLF-normalized on the
//! wire and handed back LF-normalized, matching the clipboard-style
//! convention the original protocol used.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Data sent from a redundant instance to the running one.
///
/// Screen, workspace and startup-id are filled in by the sender-side
/// coordinator right before transmission; receivers can rely on them
/// being present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageData {
    payload: Option<Vec<u8>>,
    screen: u32,
    startup_id: Option<String>,
    workspace: i32,
}

impl Default for MessageData {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageData {
    /// Create an empty message: no payload, screen 0, unknown workspace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            payload: None,
            screen: 0,
            startup_id: None,
            workspace: -1,
        }
    }

    /// Set (or clear) the raw payload. Any previous payload is replaced.
    pub fn set(&mut self, payload: Option<&[u8]>) {
        self.payload = payload.map(<[u8]>::to_vec);
    }

    /// The raw payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Set a plain-text payload, normalizing line endings to CRLF.
    pub fn set_text(&mut self, text: &str) {
        self.payload = Some(normalize_to_crlf(text).into_bytes());
    }

    /// The payload interpreted as text, line endings normalized to LF.
    ///
    /// Returns `None` if there is no payload or it is not valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let payload = self.payload.as_deref()?;
        match std::str::from_utf8(payload) {
            Ok(text) => Some(normalize_to_lf(text)),
            Err(err) => {
                tracing::warn!(error = %err, "message payload is not valid UTF-8");
                None
            }
        }
    }

    /// Set a list of URIs as the payload, one per CRLF-terminated line.
    pub fn set_uris<I, S>(&mut self, uris: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = String::new();
        for uri in uris {
            list.push_str(uri.as_ref());
            list.push_str("\r\n");
        }
        self.payload = Some(list.into_bytes());
    }

    /// The payload interpreted as a URI list.
    ///
    /// Blank lines and `#`-prefixed comment lines are skipped, per the
    /// `text/uri-list` convention. Returns `None` if the payload is
    /// missing or not text.
    #[must_use]
    pub fn uris(&self) -> Option<Vec<String>> {
        let text = self.text()?;
        Some(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Set a filename as the payload, byte-for-byte.
    pub fn set_filename(&mut self, filename: impl AsRef<Path>) {
        self.payload = Some(filename.as_ref().as_os_str().as_bytes().to_vec());
    }

    /// The payload interpreted as a filename.
    #[must_use]
    pub fn filename(&self) -> Option<PathBuf> {
        self.payload
            .as_deref()
            .map(|bytes| PathBuf::from(OsStr::from_bytes(bytes)))
    }

    /// The screen number the message originated from.
    #[must_use]
    pub fn screen(&self) -> u32 {
        self.screen
    }

    /// Set the originating screen number.
    pub fn set_screen(&mut self, screen: u32) {
        self.screen = screen;
    }

    /// The workspace the sender was on, or -1 when unknown.
    #[must_use]
    pub fn workspace(&self) -> i32 {
        self.workspace
    }

    /// Set the sender's workspace number.
    pub fn set_workspace(&mut self, workspace: i32) {
        self.workspace = workspace;
    }

    /// The startup-notification token attached to the message, if any.
    #[must_use]
    pub fn startup_id(&self) -> Option<&str> {
        self.startup_id.as_deref()
    }

    /// Attach (or clear) a startup-notification token.
    pub fn set_startup_id(&mut self, startup_id: Option<&str>) {
        self.startup_id = startup_id.map(str::to_owned);
    }
}

/// Normalize `\n` and lone `\r` into `\r\n`.
fn normalize_to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                out.push_str("\r\n");
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' => out.push_str("\r\n"),
            other => out.push(other),
        }
    }
    out
}

/// Normalize `\r\n` and lone `\r` into `\n`.
fn normalize_to_lf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                out.push('\n');
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn raw_payload_roundtrip() {
        let mut data = MessageData::new();
        assert_eq!(data.data(), None);

        data.set(Some(b"\x00binary\xff"));
        assert_eq!(data.data(), Some(b"\x00binary\xff".as_ref()));

        data.set(None);
        assert_eq!(data.data(), None);
    }

    #[test]
    fn text_is_crlf_on_the_wire_and_lf_back() {
        let mut data = MessageData::new();
        data.set_text("one\ntwo\r\nthree\rfour");

        assert_eq!(data.data(), Some(b"one\r\ntwo\r\nthree\r\nfour".as_ref()));
        assert_eq!(data.text().as_deref(), Some("one\ntwo\nthree\nfour"));
    }

    #[test]
    fn non_utf8_payload_has_no_text() {
        let mut data = MessageData::new();
        data.set(Some(b"\xff\xfe"));
        assert_eq!(data.text(), None);
        assert_eq!(data.uris(), None);
    }

    #[test]
    fn uri_list_roundtrip() {
        let mut data = MessageData::new();
        data.set_uris(["file:///tmp/a.txt", "https://example.com/b"]);

        assert_eq!(
            data.data(),
            Some(b"file:///tmp/a.txt\r\nhttps://example.com/b\r\n".as_ref())
        );
        assert_eq!(
            data.uris().unwrap(),
            vec![
                "file:///tmp/a.txt".to_owned(),
                "https://example.com/b".to_owned()
            ]
        );
    }

    #[test]
    fn uri_list_skips_comments_and_blanks() {
        let mut data = MessageData::new();
        data.set_text("# header\r\n\r\nfile:///tmp/a\r\n");
        assert_eq!(data.uris().unwrap(), vec!["file:///tmp/a".to_owned()]);
    }

    #[test]
    fn filename_roundtrip() {
        let mut data = MessageData::new();
        data.set_filename("/home/me/some file.txt");
        assert_eq!(
            data.filename(),
            Some(PathBuf::from("/home/me/some file.txt"))
        );
    }

    #[test]
    fn clone_leaves_original_untouched() {
        let mut original = MessageData::new();
        original.set(Some(b"payload"));

        let mut copy = original.clone();
        copy.set(Some(b"changed"));
        copy.set_startup_id(Some("_TIME1"));

        assert_eq!(original.data(), Some(b"payload".as_ref()));
        assert_eq!(original.startup_id(), None);
    }
}
