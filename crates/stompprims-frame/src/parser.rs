//! Resumable frame parser.
//!
//! [`FrameParser`] is fed chunks as they arrive. After every chunk it reports
//! either how much of that chunk it absorbed while the frame is still
//! incomplete, or the finished frame together with the number of bytes of that
//! chunk the frame used. Bytes past the end of the frame are left to the
//! caller, so a transport can keep them for the next parse.
//!
//! A parser produces at most one frame; create a fresh one per frame.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{Frame, Headers, CONTENT_LENGTH, DEFAULT_MAX_FRAME_SIZE};
use crate::command::Command;
use crate::error::{FrameError, Result};

/// Parser phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LeadingNewlines,
    Command,
    Headers,
    /// Waiting for `len` body bytes plus the NUL terminator.
    BodyByLength(usize),
    BodyUntilNul,
    Done,
}

/// Outcome of feeding one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// The frame is not complete yet; `consumed` bytes of the chunk were absorbed.
    Pending { consumed: usize },
    /// The frame is complete; it used the first `consumed` bytes of the chunk.
    Complete { frame: Frame, consumed: usize },
}

/// Incremental parser state for a single frame.
#[derive(Debug)]
pub struct FrameParser {
    phase: Phase,
    /// Bytes of the frame in progress, starting at its command line.
    buf: BytesMut,
    /// Offset in `buf` where the next terminator search starts.
    scan: usize,
    /// Start of the current header line, then of the body.
    mark: usize,
    command: Option<Command>,
    headers: Headers,
    max_frame_size: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            phase: Phase::LeadingNewlines,
            buf: BytesMut::new(),
            scan: 0,
            mark: 0,
            command: None,
            headers: Headers::new(),
            max_frame_size,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feed the next chunk of input.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Feed> {
        let mut data = chunk;
        let mut skipped = 0usize;

        match self.phase {
            Phase::Done => {
                return Err(FrameError::MalformedFrame(
                    "parser reused after completing a frame".to_string(),
                ));
            }
            Phase::LeadingNewlines => {
                if chunk.is_empty() {
                    return Ok(Feed::Pending { consumed: 0 });
                }
                skipped = chunk.iter().take_while(|&&b| b == b'\n').count();
                if skipped == chunk.len() {
                    trace!("heartbeat");
                    self.phase = Phase::Done;
                    return Ok(Feed::Complete {
                        frame: Frame::heartbeat(),
                        consumed: 1,
                    });
                }
                data = &chunk[skipped..];
                self.phase = Phase::Command;
            }
            _ => {}
        }

        let base = self.buf.len();
        self.buf.extend_from_slice(data);

        match self.advance()? {
            Some((end, body)) => {
                let command = self.command.take().ok_or_else(|| {
                    FrameError::MalformedFrame("frame completed without a command".to_string())
                })?;
                let headers = std::mem::take(&mut self.headers);
                self.phase = Phase::Done;
                self.buf.clear();
                Ok(Feed::Complete {
                    frame: Frame::from_parts(command, headers, body),
                    consumed: skipped + (end - base),
                })
            }
            None => {
                if self.buf.len() > self.max_frame_size {
                    return Err(FrameError::FrameTooLarge {
                        size: self.buf.len(),
                        max: self.max_frame_size,
                    });
                }
                Ok(Feed::Pending {
                    consumed: chunk.len(),
                })
            }
        }
    }

    /// Run the state machine over the buffered bytes.
    ///
    /// Returns the end offset (exclusive, after the NUL) and body once the
    /// frame is complete.
    fn advance(&mut self) -> Result<Option<(usize, Bytes)>> {
        loop {
            match self.phase {
                Phase::Command => {
                    let Some(end) = self.find(b'\n') else {
                        return Ok(None);
                    };
                    let line = utf8(&self.buf[..end], "command")?;
                    self.command = Some(Command::from_wire(line)?);
                    self.scan = end + 1;
                    self.mark = self.scan;
                    self.phase = Phase::Headers;
                }
                Phase::Headers => {
                    let Some(end) = self.find(b'\n') else {
                        return Ok(None);
                    };
                    if end == self.mark {
                        self.scan = end + 1;
                        self.mark = self.scan;
                        self.phase = self.body_phase()?;
                        continue;
                    }
                    let line = utf8(&self.buf[self.mark..end], "header")?;
                    let (key, value) = line.split_once(':').unwrap_or((line, ""));
                    self.headers.insert(key, value);
                    self.scan = end + 1;
                    self.mark = self.scan;
                }
                Phase::BodyByLength(len) => {
                    let end = self.mark + len + 1;
                    if self.buf.len() < end {
                        return Ok(None);
                    }
                    if self.buf[end - 1] != 0 {
                        return Err(FrameError::MalformedFrame(
                            "frame not terminated with null byte".to_string(),
                        ));
                    }
                    let body = Bytes::copy_from_slice(&self.buf[self.mark..end - 1]);
                    return Ok(Some((end, body)));
                }
                Phase::BodyUntilNul => {
                    let Some(nul) = self.find(0) else {
                        return Ok(None);
                    };
                    let body = Bytes::copy_from_slice(&self.buf[self.mark..nul]);
                    return Ok(Some((nul + 1, body)));
                }
                Phase::LeadingNewlines | Phase::Done => return Ok(None),
            }
        }
    }

    fn body_phase(&self) -> Result<Phase> {
        let Some(raw) = self.headers.get(CONTENT_LENGTH) else {
            return Ok(Phase::BodyUntilNul);
        };
        let len: usize = raw.trim().parse().map_err(|_| {
            FrameError::MalformedFrame(format!("invalid content-length {raw:?}"))
        })?;
        if len > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        Ok(Phase::BodyByLength(len))
    }

    /// Find `byte` at or after the scan offset. Advances the scan offset past
    /// searched bytes when it is absent.
    fn find(&mut self, byte: u8) -> Option<usize> {
        match self.buf[self.scan..].iter().position(|&b| b == byte) {
            Some(pos) => Some(self.scan + pos),
            None => {
                self.scan = self.buf.len();
                None
            }
        }
    }
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|err| FrameError::MalformedFrame(format!("{what} is not valid UTF-8: {err}")))
}

/// Parse exactly one frame from `data`.
///
/// Fails with [`FrameError::IncompleteFrame`] when `data` ends early and with
/// [`FrameError::TrailingData`] when bytes remain after the frame.
pub fn parse_frame(data: &[u8]) -> Result<Frame> {
    let mut parser = FrameParser::new();
    match parser.feed(data)? {
        Feed::Pending { consumed } => Err(FrameError::IncompleteFrame { consumed }),
        Feed::Complete { consumed, .. } if consumed < data.len() => {
            Err(FrameError::TrailingData {
                remaining: data.len() - consumed,
            })
        }
        Feed::Complete { frame, .. } => Ok(frame),
    }
}
