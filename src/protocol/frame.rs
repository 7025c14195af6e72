//! One received message: decoded header plus payload.
//!
//! ```
//! use bytes::Bytes;
//! use spectra_client::protocol::{msg_type, Frame, Header};
//!
//! let header = Header::new(msg_type::RESP_OK, 5, 3, 42, 1, 0);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.msg_type(), msg_type::RESP_OK);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::msg_type;
use super::wire_format::{Header, HEADER_SIZE};

/// Header and TLV payload of one message.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    /// TLV fields, shared without copying.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn msg_type(&self) -> u16 {
        self.header.msg_type
    }

    /// Request id from the header; 0 for events.
    #[inline]
    pub fn request_id(&self) -> u64 {
        self.header.request_id
    }

    #[inline]
    pub fn session_id(&self) -> u64 {
        self.header.session_id
    }

    /// RESP_OK, RESP_ERR or a typed response.
    #[inline]
    pub fn is_response(&self) -> bool {
        msg_type::is_response(self.header.msg_type)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.msg_type == msg_type::RESP_ERR
    }
}

/// Serialize header and payload back to back. `payload_len` is taken from
/// the payload, not the header.
///
/// ```
/// use spectra_client::protocol::{build_frame, msg_type, Header, HEADER_SIZE};
///
/// let header = Header::new(msg_type::REQ_SHOW, 0, 1, 7, 1, 0);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), HEADER_SIZE + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut header = *header;
    header.payload_len = payload.len() as u32;
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    out
}
