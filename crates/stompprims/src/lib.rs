//! Self-healing STOMP messaging client.
//!
//! # Crate Structure
//!
//! - [`transport`] - Byte-stream transport abstraction and plain TCP binding
//! - [`frame`] - STOMP frame model, serializer and resumable parser
//! - [`client`] - Connection engine and session operations (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use stompprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use stompprims_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use stompprims_client::*;
}
