use std::time::Duration;

use stompprims_transport::{Connector, TcpConnector};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;

/// Start a TCP connection and wait up to `timeout` for the first handshake.
///
/// On failure the connection is stopped before the error is returned.
pub fn connect(config: ConnectionConfig, timeout: Duration) -> Result<Connection> {
    connect_with_connector(config, TcpConnector::default(), timeout)
}

/// Like [`connect`] with a caller-supplied [`Connector`].
pub fn connect_with_connector(
    config: ConnectionConfig,
    connector: impl Connector + 'static,
    timeout: Duration,
) -> Result<Connection> {
    let conn = Connection::with_connector(config, connector);
    conn.start()?;
    if let Err(err) = conn.wait_ready(timeout) {
        conn.stop();
        conn.join();
        return Err(err);
    }
    Ok(conn)
}
