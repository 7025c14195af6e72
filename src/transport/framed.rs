//! Framed message transport over a [`Channel`].
//!
//! Turns the byte stream into `(header, payload)` frames and back. Any I/O
//! failure or framing violation closes the transport; callers reconnect
//! rather than retry on the same instance.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use super::socket::{connect_unix, Channel};
use crate::error::{Result, SpectraError};
use crate::protocol::{msg_type, Frame, Header, HEADER_SIZE, MAX_PAYLOAD_SIZE};

enum Fill {
    Complete,
    Eof,
}

/// Read until `buf` is full. `Eof` only when nothing was read at all.
fn fill_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Fill> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(Fill::Eof),
            Ok(0) => {
                return Err(SpectraError::Connection(
                    "Connection closed mid-message".into(),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Fill::Complete)
}

fn not_connected() -> SpectraError {
    SpectraError::Connection("Not connected".into())
}

/// One connection's framing state.
pub struct Transport<C: Channel = UnixStream> {
    channel: Option<C>,
    seq: u64,
    max_payload: u32,
}

impl Transport<UnixStream> {
    /// Connect to a Unix socket path.
    pub fn connect(path: &Path, io_timeout: Option<Duration>) -> Result<Self> {
        let stream = connect_unix(path, io_timeout)?;
        debug!(path = %path.display(), "transport connected");
        Ok(Self::from_channel(stream))
    }
}

impl<C: Channel> Transport<C> {
    /// Wrap an already connected channel.
    pub fn from_channel(channel: C) -> Self {
        Self {
            channel: Some(channel),
            seq: 0,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Lower the accepted payload size (never above the protocol maximum).
    pub fn with_max_payload(mut self, max_payload: u32) -> Self {
        self.max_payload = max_payload.min(MAX_PAYLOAD_SIZE);
        self
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Sequence number of the last frame sent.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Send one frame. Returns its sequence number.
    pub fn send(
        &mut self,
        kind: u16,
        payload: &[u8],
        request_id: u64,
        session_id: u64,
        window_id: u64,
    ) -> Result<u64> {
        if payload.len() > self.max_payload as usize {
            return Err(SpectraError::Protocol(format!(
                "Outgoing payload of {} bytes exceeds maximum {}",
                payload.len(),
                self.max_payload
            )));
        }
        let channel = self.channel.as_mut().ok_or_else(not_connected)?;

        self.seq += 1;
        let header = Header::new(
            kind,
            payload.len() as u32,
            self.seq,
            request_id,
            session_id,
            window_id,
        );
        let written = channel
            .write_all(&header.encode())
            .and_then(|_| channel.write_all(payload))
            .and_then(|_| channel.flush());
        if let Err(e) = written {
            self.close();
            return Err(e.into());
        }
        trace!(
            kind = msg_type::name(kind),
            seq = self.seq,
            request_id,
            len = payload.len(),
            "frame sent"
        );
        Ok(self.seq)
    }

    /// Receive one frame. `None` means the peer closed cleanly between frames.
    pub fn recv(&mut self) -> Result<Option<Frame>> {
        match self.read_frame() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                debug!("peer closed connection");
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let channel = self.channel.as_mut().ok_or_else(not_connected)?;

        let mut head = [0u8; HEADER_SIZE];
        if let Fill::Eof = fill_exact(channel, &mut head)? {
            return Ok(None);
        }
        let header = Header::decode(&head)
            .ok_or_else(|| SpectraError::Protocol("Invalid message header (bad magic)".into()))?;
        header.validate(self.max_payload)?;

        let mut payload = vec![0u8; header.payload_len as usize];
        if let Fill::Eof = fill_exact(channel, &mut payload)? {
            return Err(SpectraError::Connection(
                "Connection closed during payload read".into(),
            ));
        }
        trace!(
            kind = msg_type::name(header.msg_type),
            seq = header.seq,
            request_id = header.request_id,
            len = header.payload_len,
            "frame received"
        );
        Ok(Some(Frame::new(header, Bytes::from(payload))))
    }

    /// Wait up to `timeout` for an inbound frame to start.
    pub fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let channel = self.channel.as_ref().ok_or_else(not_connected)?;
        Ok(channel.wait_readable(timeout)?)
    }

    /// Drop the channel. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            let _ = channel.shutdown();
        }
    }
}

impl<C: Channel> Drop for Transport<C> {
    fn drop(&mut self) {
        self.close();
    }
}
