//! Byte-oriented transport adapter.
//!
//! Frames [`EditsMessage`]s with the protocol's CBOR wire codec and
//! moves the bytes through a pluggable HTTP client. The actual HTTP
//! library is abstracted behind a trait so different implementations
//! (reqwest, ureq, a WebSocket bridge) can be plugged in.

use crate::error::{ClientError, ClientResult};
use crate::transport::SyncTransport;
use replidiff_protocol::{decode_message, encode_message, EditsMessage};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual byte transport.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;
}

/// A [`SyncTransport`] over CBOR-framed HTTP posts.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport posting to `<base_url>/sync`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn send(&self, message: &EditsMessage) -> ClientResult<EditsMessage> {
        let body = encode_message(message)?;

        let url = format!("{}/sync", self.base_url);
        let response = self
            .client
            .post(&url, body)
            .map_err(|message| ClientError::Transport { message })?;

        Ok(decode_message(&response)?)
    }
}

/// Trait for servers that can handle loopback requests.
///
/// Lets tests route a client's framed bytes straight into a server
/// engine without network overhead.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST body and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

/// An [`HttpClient`] that routes requests directly to a [`LoopbackServer`].
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        let path = url.find("/sync").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoServer {
        seen_paths: Mutex<Vec<String>>,
    }

    impl LoopbackServer for EchoServer {
        fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
            self.seen_paths.lock().unwrap().push(path.to_string());
            // Echo the decoded message straight back.
            let message = decode_message(body).map_err(|e| e.to_string())?;
            encode_message(&message).map_err(|e| e.to_string())
        }
    }

    struct FailingClient;

    impl HttpClient for FailingClient {
        fn post(&self, _url: &str, _body: Vec<u8>) -> Result<Vec<u8>, String> {
            Err("503 service unavailable".into())
        }
    }

    #[test]
    fn frames_and_routes_messages() {
        let server = EchoServer {
            seen_paths: Mutex::new(Vec::new()),
        };
        let transport = HttpTransport::new("https://sync.example.com", LoopbackClient::new(server));
        assert_eq!(transport.base_url(), "https://sync.example.com");

        let message = EditsMessage::new("replica-1", vec![], 4, 2);
        let response = transport.send(&message).unwrap();
        assert_eq!(response, message);
    }

    #[test]
    fn post_failure_becomes_transport_error() {
        let transport = HttpTransport::new("https://sync.example.com", FailingClient);

        let err = transport
            .send(&EditsMessage::new("replica-1", vec![], 0, 0))
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(err.to_string().contains("503"));
    }
}
