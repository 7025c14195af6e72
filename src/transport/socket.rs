//! Byte channels the framed transport runs over.
//!
//! The daemon listens on a Unix Domain Socket; streams are blocking and
//! `poll(2)` provides the readiness check.
//!
//! # Example
//!
//! ```ignore
//! use spectra_client::transport::connect_unix;
//! use std::time::Duration;
//!
//! let stream = connect_unix("/tmp/spectra-me/spectra.sock".as_ref(), Some(Duration::from_secs(5)))?;
//! ```

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SpectraError};

/// Duplex byte stream with a readiness check.
///
/// Implemented for [`UnixStream`](std::os::unix::net::UnixStream). Tests
/// plug in scripted in-memory channels.
pub trait Channel: Read + Write + Send + 'static {
    /// Wait up to `timeout` for inbound bytes or end-of-stream.
    /// A zero timeout checks without blocking.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    /// Shut down both directions. Errors are ignored by callers.
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for UnixStream {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        poll_readable(self.as_raw_fd(), timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}

/// `poll(2)` for POLLIN. Hang-up and error count as readable so the
/// following read observes them.
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    loop {
        let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(ret > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0);
    }
}

/// Connect to the daemon socket, applying `io_timeout` to reads and writes.
pub fn connect_unix(path: &Path, io_timeout: Option<Duration>) -> Result<UnixStream> {
    let stream = UnixStream::connect(path).map_err(|e| {
        SpectraError::Connection(format!("Failed to connect to {}: {}", path.display(), e))
    })?;
    stream.set_read_timeout(io_timeout)?;
    stream.set_write_timeout(io_timeout)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_readable_on_pair() {
        let (mut a, b) = UnixStream::pair().unwrap();
        assert!(!b.wait_readable(Duration::ZERO).unwrap());

        a.write_all(b"x").unwrap();
        assert!(b.wait_readable(Duration::from_millis(500)).unwrap());
    }

    #[test]
    fn test_hangup_counts_as_readable() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(a);
        assert!(b.wait_readable(Duration::from_millis(500)).unwrap());
    }

    #[test]
    fn test_connect_missing_socket_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = connect_unix(&dir.path().join("absent.sock"), None).unwrap_err();
        assert!(matches!(err, SpectraError::Connection(_)));
        assert!(err.is_transient());
    }
}
