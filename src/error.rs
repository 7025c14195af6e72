//! Error types for spectra-client.

use thiserror::Error;

/// Main error type for all session operations.
#[derive(Debug, Error)]
pub enum SpectraError {
    /// Not connected, or the peer closed the stream at an unexpected point.
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing violation or unexpected message during handshake.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Well-formed error response from the daemon.
    #[error("Backend error {code}: {message}")]
    Backend {
        /// Numeric error code chosen by the daemon.
        code: u32,
        /// Human-readable message.
        message: String,
    },

    /// Reserved. Socket read timeouts currently surface as `Io`.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The daemon binary could not be found or did not come up.
    #[error("Launch error: {0}")]
    Launch(String),

    /// Coordinate arrays of different length.
    #[error("Length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch {
        /// Length of the first array.
        expected: usize,
        /// Length of the offending array.
        actual: usize,
    },
}

impl SpectraError {
    /// True for failures that leave the transport unusable until reconnect.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SpectraError::Connection(_) | SpectraError::Io(_))
    }

    /// True for failures worth retrying while a daemon may still be starting.
    pub fn is_transient(&self) -> bool {
        self.is_connection_error()
    }

    /// Backend error code, if this is a backend error.
    pub fn backend_code(&self) -> Option<u32> {
        match self {
            SpectraError::Backend { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias using SpectraError.
pub type Result<T> = std::result::Result<T, SpectraError>;
