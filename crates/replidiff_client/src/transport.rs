//! Transport seam for the client engine.

use crate::error::{ClientError, ClientResult};
use replidiff_protocol::EditsMessage;
use std::collections::VecDeque;
use std::sync::Mutex;

/// The client-held transport capability.
///
/// One call is one request/response round trip carrying an
/// [`EditsMessage`] each way. Implementations own timeouts and
/// connection management; the engine only sees success or
/// [`ClientError::Transport`].
pub trait SyncTransport: Send + Sync {
    /// Sends a message and awaits the server's response message.
    fn send(&self, message: &EditsMessage) -> ClientResult<EditsMessage>;
}

/// A mock transport for testing.
///
/// Responses are queued in order; each `send` consumes one. Sent
/// messages are recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<ClientResult<EditsMessage>>>,
    sent: Mutex<Vec<EditsMessage>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    pub fn push_response(&self, response: EditsMessage) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ClientError::transport(message)));
    }

    /// Returns the messages sent so far.
    pub fn sent(&self) -> Vec<EditsMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl SyncTransport for MockTransport {
    fn send(&self, message: &EditsMessage) -> ClientResult<EditsMessage> {
        self.sent.lock().unwrap().push(message.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::transport("no mock response queued")))
    }
}
