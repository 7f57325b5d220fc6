//! STOMP frame model, serializer, and resumable incremental parser.
//!
//! A frame on the wire is:
//! - a command line terminated by `\n`
//! - zero or more `key:value` header lines, each terminated by `\n`
//! - a blank line
//! - the body, followed by a single NUL byte
//!
//! A bare `\n` between frames is a heartbeat. The parser never assumes that
//! read boundaries line up with frame boundaries.

pub mod codec;
pub mod command;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, Frame, FrameConfig, Headers, CONTENT_LENGTH, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_READ_CHUNK_SIZE,
};
pub use command::{Command, ALL_COMMANDS, CLIENT_COMMANDS, SERVER_COMMANDS};
pub use error::{FrameError, Result};
pub use parser::{parse_frame, Feed, FrameParser, Phase};
pub use reader::FrameReader;
pub use writer::FrameWriter;
