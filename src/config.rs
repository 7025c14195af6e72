//! Session and launcher configuration.
//!
//! Defaults match the daemon's expectations; [`SessionConfig::from_env`]
//! layers the `SPECTRA_*` environment variables on top.

use std::path::PathBuf;
use std::time::Duration;

use crate::blob::{BLOB_TTL, SHM_THRESHOLD};
use crate::chunk::CHUNK_SIZE;
use crate::protocol::MAX_PAYLOAD_SIZE;

/// Overrides the socket path.
pub const SOCKET_ENV: &str = "SPECTRA_SOCKET";
/// Overrides the daemon binary.
pub const BACKEND_PATH_ENV: &str = "SPECTRA_BACKEND_PATH";
/// File receiving the daemon's stderr.
pub const DEBUG_LOG_ENV: &str = "SPECTRA_DEBUG_LOG";

/// Daemon binary looked up on `PATH`.
pub const BACKEND_BINARY: &str = "spectra-backend";

/// Default number of connect retries after the first attempt.
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;

/// Default linear backoff step between connect attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Default socket read/write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// How the daemon is started when nothing answers on the socket.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Explicit daemon binary; skips the environment and `PATH` lookup.
    pub backend_path: Option<PathBuf>,
    /// How long to wait for the daemon to accept connections.
    pub timeout: Duration,
    /// Interval between liveness checks while waiting.
    pub poll_interval: Duration,
    /// Where the daemon's stderr goes. Discarded when `None`.
    pub debug_log: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            backend_path: None,
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            debug_log: None,
        }
    }
}

/// Everything a [`Session`](crate::Session) needs to connect and move data.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Explicit socket path. Resolved from the environment when `None`.
    pub socket_path: Option<PathBuf>,
    /// Start the daemon if nothing is listening.
    pub auto_launch: bool,
    /// Connect attempts after the first one; only transient failures retry.
    pub connect_retries: u32,
    /// Attempt `n` waits `n * retry_backoff` before trying again.
    pub retry_backoff: Duration,
    /// Socket read/write timeout. `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
    /// Largest payload accepted on receive and allowed on send.
    pub max_payload: u32,
    /// Raw data above this size is sent as chunks.
    pub chunk_size: usize,
    /// Raw data at or above this size goes through shared memory.
    pub shm_threshold: usize,
    /// Allow shared-memory transfers at all.
    pub shm_enabled: bool,
    /// Age after which an unreleased blob is reclaimed.
    pub blob_ttl: Duration,
    /// Client type reported in HELLO.
    pub client_type: String,
    /// Client build reported in HELLO.
    pub client_build: String,
    pub launch: LaunchConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            auto_launch: true,
            connect_retries: DEFAULT_CONNECT_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            max_payload: MAX_PAYLOAD_SIZE,
            chunk_size: CHUNK_SIZE,
            shm_threshold: SHM_THRESHOLD,
            shm_enabled: true,
            blob_ttl: BLOB_TTL,
            client_type: "rust".to_string(),
            client_build: env!("CARGO_PKG_VERSION").to_string(),
            launch: LaunchConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults with `SPECTRA_SOCKET`, `SPECTRA_BACKEND_PATH` and
    /// `SPECTRA_DEBUG_LOG` applied.
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored. An explicit socket path or backend binary
    /// already set on `self` wins over the environment.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        if self.socket_path.is_none() {
            self.socket_path = get(SOCKET_ENV);
        }
        if self.launch.backend_path.is_none() {
            self.launch.backend_path = get(BACKEND_PATH_ENV);
        }
        if self.launch.debug_log.is_none() {
            self.launch.debug_log = get(DEBUG_LOG_ENV);
        }
        self
    }

    /// Backoff before connect attempt `attempt` (1-based retry number).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.auto_launch);
        assert_eq!(config.connect_retries, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(200));
        assert_eq!(config.max_payload, 256 * 1024 * 1024);
        assert_eq!(config.chunk_size, 128 * 1024 * 1024);
        assert_eq!(config.shm_threshold, 1024 * 1024);
        assert_eq!(config.blob_ttl, Duration::from_secs(60));
        assert_eq!(config.client_type, "rust");
        assert_eq!(config.launch.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_apply_env() {
        let config = SessionConfig::default().apply_env(env(&[
            (SOCKET_ENV, "/run/spectra.sock"),
            (BACKEND_PATH_ENV, "/opt/spectra/bin/spectra-backend"),
            (DEBUG_LOG_ENV, ""),
        ]));
        assert_eq!(config.socket_path, Some(PathBuf::from("/run/spectra.sock")));
        assert_eq!(
            config.launch.backend_path,
            Some(PathBuf::from("/opt/spectra/bin/spectra-backend"))
        );
        assert_eq!(config.launch.debug_log, None);
    }

    #[test]
    fn test_explicit_wins_over_env() {
        let config = SessionConfig {
            socket_path: Some(PathBuf::from("/explicit.sock")),
            ..Default::default()
        }
        .apply_env(env(&[(SOCKET_ENV, "/env.sock")]));
        assert_eq!(config.socket_path, Some(PathBuf::from("/explicit.sock")));
    }

    #[test]
    fn test_linear_backoff() {
        let config = SessionConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(600));
    }
}
