//! Configuration for the server engine.

use replidiff_delta::DeltaOptions;

/// Configuration for a [`crate::ServerEngine`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of edits accepted in one message.
    pub max_message_edits: usize,
    /// Options for the default delta engine.
    pub delta: DeltaOptions,
}

impl ServerConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_message_edits: 256,
            delta: DeltaOptions::new(),
        }
    }

    /// Sets the maximum number of edits per message.
    pub fn with_max_message_edits(mut self, max: usize) -> Self {
        self.max_message_edits = max;
        self
    }

    /// Sets the delta engine options.
    pub fn with_delta_options(mut self, delta: DeltaOptions) -> Self {
        self.delta = delta;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
