use stompprims_frame::{Command, Frame, FrameReader, FrameWriter};
use stompprims_transport::Transport;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{ClientError, Result};

/// Result of a successful CONNECT/CONNECTED exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Broker-assigned session id, when the broker sent one.
    pub session: Option<String>,
    /// Value of the broker's `server` header.
    pub server_info: Option<String>,
}

/// Build the CONNECT frame for `config`.
pub fn connect_frame(config: &ConnectionConfig) -> Frame {
    Frame::bare(Command::Connect)
        .with_header("login", config.login.as_str())
        .with_header("passcode", config.passcode.as_str())
}

/// Perform the client handshake over a freshly opened transport.
///
/// Sends CONNECT and reads frames until the first non-heartbeat frame, which
/// must be CONNECTED. The handshake timeout applies only to this exchange.
pub fn handshake<T: Transport>(transport: T, config: &ConnectionConfig) -> Result<HandshakeResult> {
    transport.set_read_timeout(config.handshake_timeout)?;

    let mut writer = FrameWriter::new(&transport);
    writer.write_frame(&connect_frame(config))?;

    let reader = FrameReader::with_config(&transport, config.frame.clone());
    let response = loop {
        let frame = reader.read_frame()?;
        if !frame.is_heartbeat() {
            break frame;
        }
    };

    if response.command != Command::Connected {
        let detail = response
            .header("message")
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        return Err(ClientError::UnexpectedFrame(format!(
            "expected CONNECTED frame from server, got {}{detail}",
            response.command
        )));
    }

    transport.set_read_timeout(None)?;

    let result = HandshakeResult {
        session: response.header("session").map(str::to_string),
        server_info: response.header("server").map(str::to_string),
    };
    debug!(session = ?result.session, server = ?result.server_info, "handshake complete");
    Ok(result)
}
