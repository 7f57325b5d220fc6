use std::fmt;
use std::time::Duration;

use stompprims_frame::FrameConfig;

/// Delay schedule between failed reconnect attempts.
///
/// Starts at `initial_delay` and doubles after every consecutive failure,
/// capped at `max_delay`. Attempts are never limited; the engine keeps
/// retrying until the connection is stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Retry immediately after every failure.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Ensure `initial_delay <= max_delay`, swapping inverted bounds.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }

    /// Delay to apply after `failures` consecutive failed attempts (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let policy = self.normalized();
        if failures == 0 {
            return Duration::ZERO;
        }
        let shift = (failures - 1).min(16);
        policy
            .initial_delay
            .saturating_mul(1u32 << shift)
            .min(policy.max_delay)
    }
}

/// Connection parameters supplied at construction.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Broker address, e.g. `broker.example.com:61613`.
    pub address: String,
    /// Login sent in the CONNECT frame.
    pub login: String,
    /// Passcode sent in the CONNECT frame. Never logged.
    pub passcode: String,
    /// Require an encrypted transport. Defaults to `true`; the bundled
    /// `TcpConnector` refuses such connections.
    pub protected: bool,
    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectPolicy,
    /// Read timeout while waiting for CONNECTED. `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// Frame reader settings.
    pub frame: FrameConfig,
}

impl ConnectionConfig {
    /// Configuration for `address` with empty credentials.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = login.into();
        self.passcode = passcode.into();
        self
    }

    pub fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            login: String::new(),
            passcode: String::new(),
            protected: true,
            reconnect: ReconnectPolicy::default(),
            handshake_timeout: Some(Duration::from_secs(5)),
            frame: FrameConfig::default(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("login", &self.login)
            .field(
                "passcode",
                &format_args!("<redacted:{} bytes>", self.passcode.len()),
            )
            .field("protected", &self.protected)
            .field("reconnect", &self.reconnect)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("frame", &self.frame)
            .finish()
    }
}
