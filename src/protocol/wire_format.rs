//! The 40-byte message header.
//!
//! ```text
//! ┌───────┬──────┬─────────────┬─────┬────────────┬────────────┬───────────┐
//! │ Magic │ Type │ Payload len │ Seq │ Request ID │ Session ID │ Window ID │
//! │ 2 B   │ u16  │ u32         │ u64 │ u64        │ u64        │ u64       │
//! └───────┴──────┴─────────────┴─────┴────────────┴────────────┴───────────┘
//! ```
//!
//! All multi-byte integers are Little Endian.

use crate::error::{Result, SpectraError};

/// Header size in bytes (fixed, exactly 40).
pub const HEADER_SIZE: usize = 40;

/// Magic bytes opening every frame ("SP").
pub const MAGIC: [u8; 2] = [0x53, 0x50];

/// Maximum payload size (256 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

/// Protocol version spoken by this client.
pub const PROTOCOL_MAJOR: u16 = 1;
/// Minor protocol version.
pub const PROTOCOL_MINOR: u16 = 0;

/// Fixed-size header in front of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Message kind (see [`msg_type`](super::msg_type)).
    pub msg_type: u16,
    /// Payload length in bytes.
    pub payload_len: u32,
    /// Per-connection send counter.
    pub seq: u64,
    /// Request identifier (0 = not a request).
    pub request_id: u64,
    /// Session assigned by the daemon at handshake.
    pub session_id: u64,
    /// Optional target window (0 = none).
    pub window_id: u64,
}

impl Header {
    /// Fields in wire order.
    pub fn new(
        msg_type: u16,
        payload_len: u32,
        seq: u64,
        request_id: u64,
        session_id: u64,
        window_id: u64,
    ) -> Self {
        Self {
            msg_type,
            payload_len,
            seq,
            request_id,
            session_id,
            window_id,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use spectra_client::protocol::{msg_type, Header, HEADER_SIZE};
    ///
    /// let header = Header::new(msg_type::HELLO, 12, 1, 0, 0, 0);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// assert_eq!(&bytes[..2], b"SP");
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Write the header into the first `HEADER_SIZE` bytes of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (40 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&MAGIC);
        buf[2..4].copy_from_slice(&self.msg_type.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[8..16].copy_from_slice(&self.seq.to_le_bytes());
        buf[16..24].copy_from_slice(&self.request_id.to_le_bytes());
        buf[24..32].copy_from_slice(&self.session_id.to_le_bytes());
        buf[32..40].copy_from_slice(&self.window_id.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if the buffer is too short or the magic does not match.
    /// The payload length is not checked here; see [`Header::validate`].
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[0..2] != MAGIC {
            return None;
        }
        Some(Self {
            msg_type: u16::from_le_bytes([buf[2], buf[3]]),
            payload_len: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            seq: read_u64(buf, 8),
            request_id: read_u64(buf, 16),
            session_id: read_u64(buf, 24),
            window_id: read_u64(buf, 32),
        })
    }

    /// Check the payload length against a configured maximum.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_len > max_payload_size {
            return Err(SpectraError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_len, max_payload_size
            )));
        }
        Ok(())
    }

    /// Check if this frame carries no request correlation.
    #[inline]
    pub fn is_uncorrelated(&self) -> bool {
        self.request_id == 0
    }
}

#[inline]
fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(word)
}

/// Same as [`Header::encode`].
#[inline]
pub fn encode_header(header: &Header) -> [u8; HEADER_SIZE] {
    header.encode()
}

/// Same as [`Header::decode`].
#[inline]
pub fn decode_header(buf: &[u8]) -> Option<Header> {
    Header::decode(buf)
}
