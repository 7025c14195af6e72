//! Protocol module - wire format, message kinds, field tags, and frames.
//!
//! This module implements the binary framing shared with the daemon:
//! - 40-byte header encoding/decoding
//! - Message type and TLV tag constants
//! - Frame struct with typed accessors

mod frame;
pub mod tags;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use wire_format::{
    decode_header, encode_header, Header, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, PROTOCOL_MAJOR,
    PROTOCOL_MINOR,
};

/// Message type constants (header `msg_type` field).
pub mod msg_type {
    // Handshake
    pub const HELLO: u16 = 0x0001;
    pub const WELCOME: u16 = 0x0002;

    // Generic responses
    pub const RESP_OK: u16 = 0x0010;
    pub const RESP_ERR: u16 = 0x0011;

    // State sync (daemon internal, never produced by this client)
    pub const STATE_SNAPSHOT: u16 = 0x0300;
    pub const STATE_DIFF: u16 = 0x0301;
    pub const ACK_STATE: u16 = 0x0302;

    // Figure requests
    pub const REQ_CREATE_FIGURE: u16 = 0x0500;
    pub const REQ_DESTROY_FIGURE: u16 = 0x0501;
    pub const REQ_CREATE_AXES: u16 = 0x0502;
    pub const REQ_ADD_SERIES: u16 = 0x0503;
    pub const REQ_REMOVE_SERIES: u16 = 0x0504;
    pub const REQ_SET_DATA: u16 = 0x0505;
    pub const REQ_UPDATE_PROPERTY: u16 = 0x0506;
    pub const REQ_SHOW: u16 = 0x0507;
    pub const REQ_CLOSE_FIGURE: u16 = 0x0508;
    pub const REQ_APPEND_DATA: u16 = 0x0509;
    pub const REQ_UPDATE_BATCH: u16 = 0x050A;

    // Queries
    pub const REQ_GET_SNAPSHOT: u16 = 0x0510;
    pub const REQ_LIST_FIGURES: u16 = 0x0511;

    // Animation
    pub const REQ_ANIM_START: u16 = 0x0520;
    pub const REQ_ANIM_STOP: u16 = 0x0521;

    // Session lifecycle
    pub const REQ_RECONNECT: u16 = 0x0530;
    pub const REQ_DISCONNECT: u16 = 0x0531;

    // Typed responses
    pub const RESP_FIGURE_CREATED: u16 = 0x0540;
    pub const RESP_AXES_CREATED: u16 = 0x0541;
    pub const RESP_SERIES_ADDED: u16 = 0x0542;
    pub const RESP_SNAPSHOT: u16 = 0x0543;
    pub const RESP_FIGURE_LIST: u16 = 0x0544;

    // Unsolicited events
    pub const EVT_WINDOW_CLOSED: u16 = 0x0550;
    pub const EVT_FIGURE_DESTROYED: u16 = 0x0552;
    pub const ANIM_TICK: u16 = 0x0560;
    pub const BLOB_RELEASE: u16 = 0x0570;

    /// Human-readable name for logging.
    pub fn name(kind: u16) -> &'static str {
        match kind {
            HELLO => "HELLO",
            WELCOME => "WELCOME",
            RESP_OK => "RESP_OK",
            RESP_ERR => "RESP_ERR",
            STATE_SNAPSHOT => "STATE_SNAPSHOT",
            STATE_DIFF => "STATE_DIFF",
            ACK_STATE => "ACK_STATE",
            REQ_CREATE_FIGURE => "REQ_CREATE_FIGURE",
            REQ_DESTROY_FIGURE => "REQ_DESTROY_FIGURE",
            REQ_CREATE_AXES => "REQ_CREATE_AXES",
            REQ_ADD_SERIES => "REQ_ADD_SERIES",
            REQ_REMOVE_SERIES => "REQ_REMOVE_SERIES",
            REQ_SET_DATA => "REQ_SET_DATA",
            REQ_UPDATE_PROPERTY => "REQ_UPDATE_PROPERTY",
            REQ_SHOW => "REQ_SHOW",
            REQ_CLOSE_FIGURE => "REQ_CLOSE_FIGURE",
            REQ_APPEND_DATA => "REQ_APPEND_DATA",
            REQ_UPDATE_BATCH => "REQ_UPDATE_BATCH",
            REQ_GET_SNAPSHOT => "REQ_GET_SNAPSHOT",
            REQ_LIST_FIGURES => "REQ_LIST_FIGURES",
            REQ_ANIM_START => "REQ_ANIM_START",
            REQ_ANIM_STOP => "REQ_ANIM_STOP",
            REQ_RECONNECT => "REQ_RECONNECT",
            REQ_DISCONNECT => "REQ_DISCONNECT",
            RESP_FIGURE_CREATED => "RESP_FIGURE_CREATED",
            RESP_AXES_CREATED => "RESP_AXES_CREATED",
            RESP_SERIES_ADDED => "RESP_SERIES_ADDED",
            RESP_SNAPSHOT => "RESP_SNAPSHOT",
            RESP_FIGURE_LIST => "RESP_FIGURE_LIST",
            EVT_WINDOW_CLOSED => "EVT_WINDOW_CLOSED",
            EVT_FIGURE_DESTROYED => "EVT_FIGURE_DESTROYED",
            ANIM_TICK => "ANIM_TICK",
            BLOB_RELEASE => "BLOB_RELEASE",
            _ => "UNKNOWN",
        }
    }

    /// Responses that may complete a pending request.
    #[inline]
    pub fn is_response(kind: u16) -> bool {
        matches!(kind, RESP_OK | RESP_ERR) || (RESP_FIGURE_CREATED..=RESP_FIGURE_LIST).contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_classification() {
        assert!(msg_type::is_response(msg_type::RESP_OK));
        assert!(msg_type::is_response(msg_type::RESP_ERR));
        assert!(msg_type::is_response(msg_type::RESP_SNAPSHOT));
        assert!(msg_type::is_response(msg_type::RESP_FIGURE_LIST));
        assert!(!msg_type::is_response(msg_type::ANIM_TICK));
        assert!(!msg_type::is_response(msg_type::EVT_WINDOW_CLOSED));
        assert!(!msg_type::is_response(msg_type::WELCOME));
    }

    #[test]
    fn test_names() {
        assert_eq!(msg_type::name(msg_type::REQ_SET_DATA), "REQ_SET_DATA");
        assert_eq!(msg_type::name(0xFFFF), "UNKNOWN");
    }
}
