//! Fluent session configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::Session;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::transport::Channel;

/// Builder for configuring and connecting a [`Session`].
///
/// Starts from [`SessionConfig::from_env`]; every setter overrides one
/// field. Call [`connect`](Self::connect) to launch the daemon if needed
/// and perform the handshake.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::from_config(SessionConfig::from_env())
    }

    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Connect to this socket instead of the resolved default.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = Some(path.into());
        self
    }

    /// Start the daemon when nothing answers. Default: true
    pub fn auto_launch(mut self, enabled: bool) -> Self {
        self.config.auto_launch = enabled;
        self
    }

    /// Retries after a transient connect failure, with linear backoff.
    /// Default: 3 retries, 200 ms step
    pub fn connect_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.config.connect_retries = retries;
        self.config.retry_backoff = backoff;
        self
    }

    /// Socket read/write timeout. `None` blocks indefinitely.
    /// Default: 5 s
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    pub fn max_payload(mut self, bytes: u32) -> Self {
        self.config.max_payload = bytes;
        self
    }

    /// Raw transfers above this size are split into chunks.
    /// Default: 128 MiB
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    /// Transfers at or above this size use shared memory.
    /// Default: 1 MiB
    pub fn shm_threshold(mut self, bytes: usize) -> Self {
        self.config.shm_threshold = bytes;
        self
    }

    pub fn shared_memory(mut self, enabled: bool) -> Self {
        self.config.shm_enabled = enabled;
        self
    }

    pub fn blob_ttl(mut self, ttl: Duration) -> Self {
        self.config.blob_ttl = ttl;
        self
    }

    /// Client type reported in HELLO. Default: "rust"
    pub fn client_type(mut self, client_type: impl Into<String>) -> Self {
        self.config.client_type = client_type.into();
        self
    }

    /// Daemon binary to launch.
    pub fn backend_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.launch.backend_path = Some(path.into());
        self
    }

    /// How long to wait for a launched daemon. Default: 5 s
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.config.launch.timeout = timeout;
        self
    }

    /// Send the daemon's stderr to this file.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.launch.debug_log = Some(path.into());
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_config(self) -> SessionConfig {
        self.config
    }

    /// Connect over the Unix socket, launching the daemon if allowed.
    pub fn connect(self) -> Result<Session> {
        Session::connect(self.config)
    }

    /// Connect over channels produced by `connector`.
    pub fn connect_with<C, F>(self, connector: F) -> Result<Session<C>>
    where
        C: Channel,
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        Session::with_connector(self.config, connector)
    }
}
