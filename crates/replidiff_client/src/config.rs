//! Configuration for the client engine.

use replidiff_delta::DeltaOptions;
use std::time::Duration;

/// Configuration for a [`crate::SyncClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Delay between cycles of the periodic sync scheduler.
    pub sync_interval: Duration,
    /// Options for the default delta engine.
    pub delta: DeltaOptions,
}

impl ClientConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            delta: DeltaOptions::new(),
        }
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the delta engine options.
    pub fn with_delta_options(mut self, delta: DeltaOptions) -> Self {
        self.delta = delta;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
