use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use stompprims_client::ConnectionConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message, then disconnect.
    Send(SendArgs),
    /// Subscribe to a destination and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that talks to a broker.
#[derive(Args)]
pub struct BrokerArgs {
    /// Broker address (host:port).
    pub address: String,
    /// Login sent in the CONNECT frame.
    #[arg(long, default_value = "", env = "STOMP_LOGIN")]
    pub login: String,
    /// Passcode sent in the CONNECT frame.
    #[arg(long, default_value = "", env = "STOMP_PASSCODE", hide_env_values = true)]
    pub passcode: String,
    /// Allow an unencrypted connection.
    #[arg(long)]
    pub plaintext: bool,
    /// Time allowed for connecting and for the broker's receipts (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl std::fmt::Debug for BrokerArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerArgs")
            .field("address", &self.address)
            .field("login", &self.login)
            .field("passcode", &"<redacted>")
            .field("plaintext", &self.plaintext)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BrokerArgs {
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.address.as_str())
            .with_credentials(self.login.as_str(), self.passcode.as_str())
            .with_protected(!self.plaintext)
    }

    pub fn timeout(&self) -> CliResult<Duration> {
        parse_duration(&self.timeout)
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,
    /// Destination to send to.
    pub destination: String,
    /// Raw string body.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read body from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Extra header (repeatable).
    #[arg(long = "header", short = 'H', value_name = "KEY=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,
    /// Destination to subscribe to.
    pub destination: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_header(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{input}`")),
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
