use bytes::{BufMut, Bytes, BytesMut};

use crate::command::Command;
use crate::error::{FrameError, Result};

/// Header carrying the exact body length.
pub const CONTENT_LENGTH: &str = "content-length";

/// Default maximum size of a single frame: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default number of bytes peeked from the transport per parser step.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Ordered frame headers with unique keys.
///
/// Iteration follows insertion order so serialization is deterministic.
/// Inserting an existing key replaces its value in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Headers,
    pub body: Bytes,
}

impl Frame {
    /// Build a frame from a command name, validating it against the protocol.
    pub fn new(command: &str, headers: Headers, body: impl Into<Bytes>) -> Result<Self> {
        let command = command.parse::<Command>()?;
        Ok(Self::from_parts(command, headers, body))
    }

    /// Build a frame from an already validated command.
    pub fn from_parts(command: Command, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            command,
            headers,
            body: body.into(),
        }
    }

    /// A frame with no headers and no body.
    pub fn bare(command: Command) -> Self {
        Self::from_parts(command, Headers::new(), Bytes::new())
    }

    /// A bare keep-alive.
    pub fn heartbeat() -> Self {
        Self::bare(Command::Heartbeat)
    }

    /// Builder-style header insertion.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Builder-style body replacement.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_heartbeat(&self) -> bool {
        self.command == Command::Heartbeat
    }

    /// Convenience lookup into the headers.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Record `content-length` for a non-empty body unless the caller set one.
    pub fn ensure_content_length(&mut self) {
        if !self.body.is_empty() && !self.headers.contains_key(CONTENT_LENGTH) {
            self.headers
                .insert(CONTENT_LENGTH, self.body.len().to_string());
        }
    }

    /// Serialize to wire bytes.
    ///
    /// Adds `content-length` to this frame's headers first, so the frame is
    /// modified by the call.
    pub fn serialize(&mut self) -> Result<Bytes> {
        self.ensure_content_length();
        let mut dst = BytesMut::with_capacity(self.wire_size_hint());
        encode_frame(self, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Parse exactly one frame from `data`. See [`parse_frame`](crate::parse_frame).
    pub fn parse(data: &[u8]) -> Result<Self> {
        crate::parser::parse_frame(data)
    }

    fn wire_size_hint(&self) -> usize {
        let headers: usize = self.headers.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
        self.command.as_str().len() + headers + self.body.len() + 3
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// COMMAND\n
/// key:value\n      (once per header, insertion order)
/// \n
/// body\0
/// ```
///
/// A non-empty body without a `content-length` header gets one appended after
/// the caller's headers. A heartbeat encodes as a single `\n`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if frame.is_heartbeat() {
        dst.put_u8(b'\n');
        return Ok(());
    }

    for (key, value) in frame.headers.iter() {
        if key.contains(['\n', ':']) || value.contains('\n') {
            return Err(FrameError::InvalidHeader(key.to_string()));
        }
    }

    dst.put_slice(frame.command.as_str().as_bytes());
    dst.put_u8(b'\n');
    for (key, value) in frame.headers.iter() {
        put_header(dst, key, value);
    }
    if !frame.body.is_empty() && !frame.headers.contains_key(CONTENT_LENGTH) {
        put_header(dst, CONTENT_LENGTH, &frame.body.len().to_string());
    }
    dst.put_u8(b'\n');
    dst.put_slice(&frame.body);
    dst.put_u8(0);
    Ok(())
}

fn put_header(dst: &mut BytesMut, key: &str, value: &str) {
    dst.put_slice(key.as_bytes());
    dst.put_u8(b':');
    dst.put_slice(value.as_bytes());
    dst.put_u8(b'\n');
}

/// Configuration for frame reading.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum size of one frame in bytes. Default: 16 MiB.
    pub max_frame_size: usize,
    /// Bytes requested from the transport per peek. Default: 4 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_send_frame() {
        let mut frame = Frame::bare(Command::Send)
            .with_header("destination", "/queue/x")
            .with_header("receipt", "0")
            .with_body("hello");

        let wire = frame.serialize().unwrap();

        assert_eq!(
            wire.as_ref(),
            b"SEND\ndestination:/queue/x\nreceipt:0\ncontent-length:5\n\nhello\0"
        );
        assert_eq!(frame.header(CONTENT_LENGTH), Some("5"));
    }

    #[test]
    fn serialize_without_headers_or_body() {
        let mut frame = Frame::bare(Command::Disconnect);
        let wire = frame.serialize().unwrap();
        assert_eq!(wire.as_ref(), b"DISCONNECT\n\n\0");
        assert!(frame.headers.is_empty());
    }

    #[test]
    fn caller_content_length_is_never_overwritten() {
        let mut frame = Frame::bare(Command::Send)
            .with_header(CONTENT_LENGTH, "3")
            .with_body("abcdef");

        let wire = frame.serialize().unwrap();
        assert_eq!(wire.as_ref(), b"SEND\ncontent-length:3\n\nabcdef\0");
        assert_eq!(frame.headers.len(), 1);
    }

    #[test]
    fn encode_without_mutation_matches_serialize() {
        let frame = Frame::bare(Command::Send)
            .with_header("destination", "/q")
            .with_body("xy");
        let mut dst = BytesMut::new();
        encode_frame(&frame, &mut dst).unwrap();

        let mut owned = frame.clone();
        assert_eq!(dst.freeze(), owned.serialize().unwrap());
        assert!(!frame.headers.contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn heartbeat_serializes_to_newline() {
        let mut frame = Frame::heartbeat();
        assert_eq!(frame.serialize().unwrap().as_ref(), b"\n");
    }

    #[test]
    fn header_values_may_contain_colons() {
        let mut frame = Frame::bare(Command::Send).with_header("reply-to", "tcp://a:1");
        let wire = frame.serialize().unwrap();
        assert_eq!(wire.as_ref(), b"SEND\nreply-to:tcp://a:1\n\n\0");
    }

    #[test]
    fn newline_in_header_is_rejected() {
        let mut frame = Frame::bare(Command::Send).with_header("bad", "a\nb");
        assert!(matches!(
            frame.serialize(),
            Err(FrameError::InvalidHeader(key)) if key == "bad"
        ));
    }

    #[test]
    fn new_validates_command() {
        assert!(Frame::new("SEND", Headers::new(), "").is_ok());
        assert!(Frame::new("HEARTBEAT", Headers::new(), "").is_ok());
        assert!(matches!(
            Frame::new("BOGUS", Headers::new(), ""),
            Err(FrameError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn headers_keep_insertion_order_and_replace_in_place() {
        let mut headers: Headers = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(headers.insert("b", "20"), Some("2".to_string()));

        let keys: Vec<_> = headers.iter().collect();
        assert_eq!(keys, vec![("a", "1"), ("b", "20"), ("c", "3")]);

        assert_eq!(headers.remove("a"), Some("1".to_string()));
        assert_eq!(headers.len(), 2);
        assert!(!headers.contains_key("a"));
    }
}
