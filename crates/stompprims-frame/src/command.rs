//! Protocol commands.
//!
//! Client commands flow towards the broker, server commands flow back.
//! `HEARTBEAT` is a synthetic marker for a bare `\n` between frames and never
//! appears as a command line on the wire.

use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// Commands a client sends to the broker.
pub const CLIENT_COMMANDS: &[&str] = &[
    "SEND",
    "SUBSCRIBE",
    "UNSUBSCRIBE",
    "BEGIN",
    "COMMIT",
    "ABORT",
    "ACK",
    "NACK",
    "DISCONNECT",
    "CONNECT",
    "STOMP",
];

/// Commands the broker sends to a client.
pub const SERVER_COMMANDS: &[&str] = &["CONNECTED", "MESSAGE", "RECEIPT", "ERROR"];

/// Every command accepted on the wire.
pub const ALL_COMMANDS: &[&str] = &[
    "SEND",
    "SUBSCRIBE",
    "UNSUBSCRIBE",
    "BEGIN",
    "COMMIT",
    "ABORT",
    "ACK",
    "NACK",
    "DISCONNECT",
    "CONNECT",
    "STOMP",
    "CONNECTED",
    "MESSAGE",
    "RECEIPT",
    "ERROR",
];

/// A frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Send,
    Subscribe,
    Unsubscribe,
    Begin,
    Commit,
    Abort,
    Ack,
    Nack,
    Disconnect,
    Connect,
    Stomp,
    Connected,
    Message,
    Receipt,
    Error,
    /// Keep-alive marker; serialized as a single `\n`.
    Heartbeat,
}

impl Command {
    /// Wire spelling of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Disconnect => "DISCONNECT",
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Heartbeat => "HEARTBEAT",
        }
    }

    /// Returns true for commands a client sends.
    pub fn is_client(self) -> bool {
        CLIENT_COMMANDS.contains(&self.as_str())
    }

    /// Returns true for commands the broker sends.
    pub fn is_server(self) -> bool {
        SERVER_COMMANDS.contains(&self.as_str())
    }

    /// Parse a command line read from the wire.
    ///
    /// Unlike [`FromStr`], the synthetic `HEARTBEAT` marker is rejected here.
    pub fn from_wire(line: &str) -> Result<Self> {
        match line.parse::<Command>()? {
            Command::Heartbeat => Err(invalid(line)),
            command => Ok(command),
        }
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let command = match s {
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "DISCONNECT" => Command::Disconnect,
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "HEARTBEAT" => Command::Heartbeat,
            other => return Err(invalid(other)),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn invalid(command: &str) -> FrameError {
    FrameError::InvalidCommand {
        command: command.to_string(),
        valid: ALL_COMMANDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_command_parses() {
        for name in ALL_COMMANDS {
            let command: Command = name.parse().unwrap();
            assert_eq!(command.as_str(), *name);
        }
        assert_eq!("HEARTBEAT".parse::<Command>().unwrap(), Command::Heartbeat);
    }

    #[test]
    fn bogus_command_is_rejected_with_valid_list() {
        let err = "BOGUS".parse::<Command>().unwrap_err();
        match err {
            FrameError::InvalidCommand { command, valid } => {
                assert_eq!(command, "BOGUS");
                assert_eq!(valid.len(), 15);
                assert!(valid.contains(&"CONNECTED"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_command_message_lists_valid_commands() {
        let err = "nope".parse::<Command>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"nope\""));
        assert!(msg.contains("SUBSCRIBE"));
    }

    #[test]
    fn heartbeat_is_not_a_wire_command() {
        assert!(matches!(
            Command::from_wire("HEARTBEAT"),
            Err(FrameError::InvalidCommand { .. })
        ));
        assert_eq!(Command::from_wire("MESSAGE").unwrap(), Command::Message);
    }

    #[test]
    fn commands_are_partitioned_by_direction() {
        assert!(Command::Send.is_client());
        assert!(!Command::Send.is_server());
        assert!(Command::Receipt.is_server());
        assert!(!Command::Heartbeat.is_client());
        assert!(!Command::Heartbeat.is_server());
        assert_eq!(CLIENT_COMMANDS.len() + SERVER_COMMANDS.len(), ALL_COMMANDS.len());
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert!("send".parse::<Command>().is_err());
    }
}
