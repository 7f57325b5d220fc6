//! Callbacks for frames the broker pushes to the client.

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use stompprims_frame::{Frame, Headers};

/// A MESSAGE frame delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Value of the `destination` header, empty when the broker omitted it.
    pub destination: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Message {
    pub fn from_frame(frame: Frame) -> Self {
        Self {
            destination: frame.header("destination").unwrap_or_default().to_string(),
            headers: frame.headers,
            body: frame.body,
        }
    }
}

/// Invoked for each received MESSAGE.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Invoked for each received ERROR frame.
pub type ErrorHandler = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Handler slots, replaceable while the connection runs.
#[derive(Default)]
pub(crate) struct Handlers {
    message: RwLock<Option<MessageHandler>>,
    error: RwLock<Option<ErrorHandler>>,
}

impl Handlers {
    pub(crate) fn set_message(&self, handler: MessageHandler) {
        *self.message.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub(crate) fn set_error(&self, handler: ErrorHandler) {
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub(crate) fn message(&self) -> Option<MessageHandler> {
        self.message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn error(&self) -> Option<ErrorHandler> {
        self.error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
