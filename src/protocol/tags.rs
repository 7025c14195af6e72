//! TLV field tags.
//!
//! Tags are one byte. Tags shared with the daemon's state-sync protocol are
//! listed alongside the client-specific range starting at `0xA1`.

// Handshake
pub const PROTOCOL_MAJOR: u8 = 0x10;
pub const PROTOCOL_MINOR: u8 = 0x11;
pub const AGENT_BUILD: u8 = 0x12;
pub const CAPABILITIES: u8 = 0x13;
pub const CLIENT_TYPE: u8 = 0x14;

// Welcome
pub const SESSION_ID: u8 = 0x20;
pub const WINDOW_ID: u8 = 0x21;
pub const PROCESS_ID: u8 = 0x22;
pub const HEARTBEAT_MS: u8 = 0x23;
pub const MODE: u8 = 0x24;

// Responses
pub const REQUEST_ID: u8 = 0x30;
pub const ERROR_CODE: u8 = 0x31;
pub const ERROR_MESSAGE: u8 = 0x32;

// Control
pub const FIGURE_ID: u8 = 0x40;
pub const FIGURE_IDS: u8 = 0x41;
pub const ACTIVE_FIGURE: u8 = 0x42;
pub const REASON: u8 = 0x44;
pub const FIGURE_COUNT: u8 = 0x45;

// State snapshot
pub const REVISION: u8 = 0x50;
pub const FIGURE_BLOB: u8 = 0x53;

// Figure and series
pub const TITLE: u8 = 0x60;
pub const WIDTH: u8 = 0x61;
pub const HEIGHT: u8 = 0x62;
pub const GRID_ROWS: u8 = 0x63;
pub const GRID_COLS: u8 = 0x64;
pub const X_MIN: u8 = 0x65;
pub const X_MAX: u8 = 0x66;
pub const Y_MIN: u8 = 0x67;
pub const Y_MAX: u8 = 0x68;
pub const GRID_VISIBLE: u8 = 0x69;
pub const SERIES_TYPE: u8 = 0x6D;
pub const POINT_COUNT: u8 = 0x76;
pub const SERIES_DATA: u8 = 0x77;

// Diff operations
pub const OP_TYPE: u8 = 0x80;
pub const AXES_INDEX: u8 = 0x81;
pub const SERIES_INDEX: u8 = 0x82;
pub const F1: u8 = 0x83;
pub const F2: u8 = 0x84;
pub const F3: u8 = 0x85;
pub const F4: u8 = 0x86;
pub const BOOL_VAL: u8 = 0x87;
pub const STR_VAL: u8 = 0x88;
pub const OP_DATA: u8 = 0x89;

// Client requests
pub const GRID_INDEX: u8 = 0xA1;
pub const SERIES_LABEL: u8 = 0xA2;
pub const DTYPE: u8 = 0xA3;
pub const PROPERTY_NAME: u8 = 0xA4;
pub const SESSION_TOKEN: u8 = 0xA5;
pub const IS_3D: u8 = 0xA6;

// Data transfer
pub const BLOB_INLINE: u8 = 0xB0;
pub const BATCH_ITEM: u8 = 0xB1;
pub const BLOB_SHM: u8 = 0xB2;
pub const CHUNK_INDEX: u8 = 0xB3;
pub const CHUNK_COUNT: u8 = 0xB4;
pub const TOTAL_COUNT: u8 = 0xB5;
