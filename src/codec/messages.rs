//! Typed payloads for every message kind the client sends or handles.
//!
//! Requests have an `encode()` producing the TLV payload. Responses and
//! events have a best-effort `decode()`; they also carry `encode()` so an
//! in-process peer (tests, tooling) can speak the same wire format.
//! Optional fields are omitted from the wire when they hold their default.

use bytes::Bytes;

use super::{PayloadDecoder, PayloadEncoder};
use crate::protocol::{msg_type, tags, Frame, PROTOCOL_MAJOR, PROTOCOL_MINOR};

/// Heartbeat interval assumed when WELCOME does not carry one.
pub const DEFAULT_HEARTBEAT_MS: u32 = 5000;

/// Default window size for new figures.
pub const DEFAULT_FIGURE_WIDTH: u32 = 1280;
pub const DEFAULT_FIGURE_HEIGHT: u32 = 720;

/// Walk every field of `payload`, handing each to `f`.
fn for_each_field<'a>(payload: &'a [u8], mut f: impl FnMut(&PayloadDecoder<'a>)) {
    let mut dec = PayloadDecoder::new(payload);
    while dec.next() {
        f(&dec);
    }
}

/// Payload holding a single figure id. Used by destroy, close and anim stop.
pub fn encode_figure_id(figure_id: u64) -> Bytes {
    let mut enc = PayloadEncoder::with_capacity(13);
    enc.put_u64(tags::FIGURE_ID, figure_id);
    enc.take()
}

/// First FIGURE_ID field of a payload, or 0.
pub fn decode_figure_id(payload: &[u8]) -> u64 {
    let mut figure_id = 0;
    let mut seen = false;
    for_each_field(payload, |dec| {
        if !seen && dec.tag() == tags::FIGURE_ID {
            figure_id = dec.as_u64();
            seen = true;
        }
    });
    figure_id
}

// ============================================================================
// Handshake
// ============================================================================

/// Client identity sent as the first message on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub protocol_major: u16,
    pub protocol_minor: u16,
    pub build: String,
    pub capabilities: u32,
    pub client_type: String,
}

impl Hello {
    pub fn new(client_type: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            protocol_major: PROTOCOL_MAJOR,
            protocol_minor: PROTOCOL_MINOR,
            build: build.into(),
            capabilities: 0,
            client_type: client_type.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u16(tags::PROTOCOL_MAJOR, self.protocol_major)
            .put_u16(tags::PROTOCOL_MINOR, self.protocol_minor)
            .put_string(tags::AGENT_BUILD, &self.build)
            .put_u32(tags::CAPABILITIES, self.capabilities)
            .put_string(tags::CLIENT_TYPE, &self.client_type);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut hello = Self {
            protocol_major: 0,
            protocol_minor: 0,
            build: String::new(),
            capabilities: 0,
            client_type: String::new(),
        };
        for_each_field(payload, |dec| match dec.tag() {
            tags::PROTOCOL_MAJOR => hello.protocol_major = dec.as_u16(),
            tags::PROTOCOL_MINOR => hello.protocol_minor = dec.as_u16(),
            tags::AGENT_BUILD => hello.build = dec.as_string(),
            tags::CAPABILITIES => hello.capabilities = dec.as_u32(),
            tags::CLIENT_TYPE => hello.client_type = dec.as_string(),
            _ => {}
        });
        hello
    }
}

/// Daemon's handshake reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub session_id: u64,
    pub window_id: u64,
    pub process_id: u64,
    pub heartbeat_ms: u32,
    pub mode: String,
}

impl Default for Welcome {
    fn default() -> Self {
        Self {
            session_id: 0,
            window_id: 0,
            process_id: 0,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            mode: String::new(),
        }
    }
}

impl Welcome {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::SESSION_ID, self.session_id)
            .put_u64(tags::WINDOW_ID, self.window_id)
            .put_u64(tags::PROCESS_ID, self.process_id)
            .put_u32(tags::HEARTBEAT_MS, self.heartbeat_ms)
            .put_string(tags::MODE, &self.mode);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut welcome = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::SESSION_ID => welcome.session_id = dec.as_u64(),
            tags::WINDOW_ID => welcome.window_id = dec.as_u64(),
            tags::PROCESS_ID => welcome.process_id = dec.as_u64(),
            tags::HEARTBEAT_MS => welcome.heartbeat_ms = dec.as_u32(),
            tags::MODE => welcome.mode = dec.as_string(),
            _ => {}
        });
        welcome
    }
}

// ============================================================================
// Figure structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFigure {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for CreateFigure {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: DEFAULT_FIGURE_WIDTH,
            height: DEFAULT_FIGURE_HEIGHT,
        }
    }
}

impl CreateFigure {
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_string(tags::TITLE, &self.title)
            .put_u32(tags::WIDTH, self.width)
            .put_u32(tags::HEIGHT, self.height);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut req = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::TITLE => req.title = dec.as_string(),
            tags::WIDTH => req.width = dec.as_u32(),
            tags::HEIGHT => req.height = dec.as_u32(),
            _ => {}
        });
        req
    }
}

/// Subplot in a `rows × cols` grid. `index` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateAxes {
    pub figure_id: u64,
    pub rows: u32,
    pub cols: u32,
    pub index: u32,
    pub is_3d: bool,
}

impl CreateAxes {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u32(tags::GRID_ROWS, self.rows)
            .put_u32(tags::GRID_COLS, self.cols)
            .put_u32(tags::GRID_INDEX, self.index);
        if self.is_3d {
            enc.put_bool(tags::IS_3D, true);
        }
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut req = Self {
            figure_id: 0,
            rows: 0,
            cols: 0,
            index: 0,
            is_3d: false,
        };
        for_each_field(payload, |dec| match dec.tag() {
            tags::FIGURE_ID => req.figure_id = dec.as_u64(),
            tags::GRID_ROWS => req.rows = dec.as_u32(),
            tags::GRID_COLS => req.cols = dec.as_u32(),
            tags::GRID_INDEX => req.index = dec.as_u32(),
            tags::IS_3D => req.is_3d = dec.as_bool(),
            _ => {}
        });
        req
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSeries {
    pub figure_id: u64,
    pub axes_index: u32,
    pub series_type: String,
    pub label: String,
}

impl AddSeries {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u32(tags::AXES_INDEX, self.axes_index)
            .put_string(tags::SERIES_TYPE, &self.series_type)
            .put_string(tags::SERIES_LABEL, &self.label);
        enc.take()
    }
}

pub fn encode_remove_series(figure_id: u64, series_index: u32) -> Bytes {
    let mut enc = PayloadEncoder::with_capacity(22);
    enc.put_u64(tags::FIGURE_ID, figure_id)
        .put_u32(tags::SERIES_INDEX, series_index);
    enc.take()
}

// ============================================================================
// Series data
// ============================================================================

/// Position of one physical message inside a chunked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// 0-based.
    pub index: u32,
    pub count: u32,
    /// Elements across all chunks.
    pub total_count: u32,
}

/// Where the series values travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataSource<'a> {
    /// Values written inline as a float array. Empty writes no blob field.
    Floats(&'a [f32]),
    /// Little-endian `f32` bytes holding `count` elements.
    Raw { bytes: &'a [u8], count: u32 },
    /// Shared-memory segment holding `count` little-endian `f32`s.
    Shm { name: &'a str, count: u32 },
}

impl DataSource<'_> {
    fn write(&self, enc: &mut PayloadEncoder) {
        match *self {
            DataSource::Floats(values) => {
                if !values.is_empty() {
                    enc.put_float_array(tags::BLOB_INLINE, values);
                }
            }
            DataSource::Raw { bytes, count } => {
                enc.put_float_array_raw(tags::BLOB_INLINE, count, bytes);
            }
            DataSource::Shm { name, count } => {
                enc.put_string(tags::BLOB_SHM, name)
                    .put_u32(tags::TOTAL_COUNT, count);
            }
        }
    }
}

/// Replace a series' values, whole or as one chunk of a larger transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetData<'a> {
    pub figure_id: u64,
    pub series_index: u32,
    pub dtype: u16,
    pub chunk: Option<ChunkInfo>,
    pub data: DataSource<'a>,
}

impl<'a> SetData<'a> {
    pub fn new(figure_id: u64, series_index: u32, data: DataSource<'a>) -> Self {
        Self {
            figure_id,
            series_index,
            dtype: 0,
            chunk: None,
            data,
        }
    }

    pub fn chunk(mut self, chunk: ChunkInfo) -> Self {
        self.chunk = Some(chunk);
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::with_capacity(64 + self.inline_len());
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u32(tags::SERIES_INDEX, self.series_index)
            .put_u16(tags::DTYPE, self.dtype);
        if let Some(chunk) = self.chunk {
            enc.put_u32(tags::CHUNK_INDEX, chunk.index)
                .put_u32(tags::CHUNK_COUNT, chunk.count)
                .put_u32(tags::TOTAL_COUNT, chunk.total_count);
        }
        self.data.write(&mut enc);
        enc.take()
    }

    fn inline_len(&self) -> usize {
        match self.data {
            DataSource::Floats(values) => 4 + values.len() * 4,
            DataSource::Raw { bytes, .. } => 4 + bytes.len(),
            DataSource::Shm { name, .. } => name.len(),
        }
    }
}

/// Decoded REQ_SET_DATA / REQ_APPEND_DATA payload, as a receiver sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataMessage {
    pub figure_id: u64,
    pub series_index: u32,
    pub dtype: u16,
    pub chunk: Option<ChunkInfo>,
    pub values: Vec<f32>,
    pub shm_name: Option<String>,
    pub shm_count: u32,
}

impl DataMessage {
    /// Chunk tags are optional; a payload without them is a plain write.
    pub fn decode(payload: &[u8]) -> Self {
        let mut msg = Self::default();
        let (mut index, mut count, mut total) = (None, None, 0u32);
        for_each_field(payload, |dec| match dec.tag() {
            tags::FIGURE_ID => msg.figure_id = dec.as_u64(),
            tags::SERIES_INDEX => msg.series_index = dec.as_u32(),
            tags::DTYPE => msg.dtype = dec.as_u16(),
            tags::CHUNK_INDEX => index = Some(dec.as_u32()),
            tags::CHUNK_COUNT => count = Some(dec.as_u32()),
            tags::TOTAL_COUNT => total = dec.as_u32(),
            tags::BLOB_INLINE => msg.values = dec.as_float_array(),
            tags::BLOB_SHM => msg.shm_name = Some(dec.as_string()),
            _ => {}
        });
        match (index, count) {
            (Some(index), Some(count)) => {
                msg.chunk = Some(ChunkInfo {
                    index,
                    count,
                    total_count: total,
                })
            }
            _ => msg.shm_count = total,
        }
        msg
    }
}

/// Append values to a series (streaming).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendData<'a> {
    pub figure_id: u64,
    pub series_index: u32,
    pub data: DataSource<'a>,
}

impl AppendData<'_> {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u32(tags::SERIES_INDEX, self.series_index);
        self.data.write(&mut enc);
        enc.take()
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Generic property update. Interpretation of the four numeric slots,
/// the flag and the text is up to the daemon for each property name.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateProperty {
    pub figure_id: u64,
    pub axes_index: u32,
    pub series_index: u32,
    pub name: String,
    pub values: [f64; 4],
    pub flag: bool,
    pub text: String,
}

impl UpdateProperty {
    pub fn new(figure_id: u64, name: impl Into<String>) -> Self {
        Self {
            figure_id,
            axes_index: 0,
            series_index: 0,
            name: name.into(),
            values: [0.0; 4],
            flag: false,
            text: String::new(),
        }
    }

    pub fn axes(mut self, axes_index: u32) -> Self {
        self.axes_index = axes_index;
        self
    }

    pub fn series(mut self, series_index: u32) -> Self {
        self.series_index = series_index;
        self
    }

    pub fn values(mut self, values: [f64; 4]) -> Self {
        self.values = values;
        self
    }

    pub fn flag(mut self, flag: bool) -> Self {
        self.flag = flag;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u32(tags::AXES_INDEX, self.axes_index)
            .put_u32(tags::SERIES_INDEX, self.series_index)
            .put_string(tags::PROPERTY_NAME, &self.name)
            .put_f64(tags::F1, self.values[0])
            .put_f64(tags::F2, self.values[1])
            .put_f64(tags::F3, self.values[2])
            .put_f64(tags::F4, self.values[3])
            .put_bool(tags::BOOL_VAL, self.flag);
        if !self.text.is_empty() {
            enc.put_string(tags::STR_VAL, &self.text);
        }
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut upd = Self::new(0, "");
        for_each_field(payload, |dec| match dec.tag() {
            tags::FIGURE_ID => upd.figure_id = dec.as_u64(),
            tags::AXES_INDEX => upd.axes_index = dec.as_u32(),
            tags::SERIES_INDEX => upd.series_index = dec.as_u32(),
            tags::PROPERTY_NAME => upd.name = dec.as_string(),
            tags::F1 => upd.values[0] = dec.as_f64(),
            tags::F2 => upd.values[1] = dec.as_f64(),
            tags::F3 => upd.values[2] = dec.as_f64(),
            tags::F4 => upd.values[3] = dec.as_f64(),
            tags::BOOL_VAL => upd.flag = dec.as_bool(),
            tags::STR_VAL => upd.text = dec.as_string(),
            _ => {}
        });
        upd
    }
}

/// Several property updates in one message, each a nested BATCH_ITEM.
pub fn encode_update_batch(updates: &[UpdateProperty]) -> Bytes {
    let mut enc = PayloadEncoder::new();
    for update in updates {
        enc.put_blob(tags::BATCH_ITEM, &update.encode());
    }
    enc.take()
}

pub fn decode_update_batch(payload: &[u8]) -> Vec<UpdateProperty> {
    let mut items = Vec::new();
    for_each_field(payload, |dec| {
        if dec.tag() == tags::BATCH_ITEM {
            items.push(UpdateProperty::decode(dec.as_blob()));
        }
    });
    items
}

// ============================================================================
// Windows, session, animation
// ============================================================================

/// WINDOW_ID is only sent when non-zero.
pub fn encode_show(figure_id: u64, window_id: u64) -> Bytes {
    let mut enc = PayloadEncoder::with_capacity(26);
    enc.put_u64(tags::FIGURE_ID, figure_id);
    if window_id != 0 {
        enc.put_u64(tags::WINDOW_ID, window_id);
    }
    enc.take()
}

/// `session_id` 0 accepts any live session. The token is sent only if set.
pub fn encode_reconnect(session_id: u64, token: &str) -> Bytes {
    let mut enc = PayloadEncoder::new();
    enc.put_u64(tags::SESSION_ID, session_id);
    if !token.is_empty() {
        enc.put_string(tags::SESSION_TOKEN, token);
    }
    enc.take()
}

/// `duration` 0 runs until stopped.
pub fn encode_anim_start(figure_id: u64, fps: f32, duration: f32) -> Bytes {
    let mut enc = PayloadEncoder::with_capacity(31);
    enc.put_u64(tags::FIGURE_ID, figure_id)
        .put_f32(tags::F1, fps)
        .put_f32(tags::F2, duration);
    enc.take()
}

// ============================================================================
// Responses
// ============================================================================

/// Request id echoed inside a response payload, or 0.
pub fn decode_request_id(payload: &[u8]) -> u64 {
    let mut request_id = 0;
    for_each_field(payload, |dec| {
        if dec.tag() == tags::REQUEST_ID {
            request_id = dec.as_u64();
        }
    });
    request_id
}

pub fn encode_resp_ok(request_id: u64) -> Bytes {
    let mut enc = PayloadEncoder::with_capacity(13);
    enc.put_u64(tags::REQUEST_ID, request_id);
    enc.take()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RespErr {
    pub request_id: u64,
    pub code: u32,
    pub message: String,
}

impl RespErr {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::REQUEST_ID, self.request_id)
            .put_u32(tags::ERROR_CODE, self.code)
            .put_string(tags::ERROR_MESSAGE, &self.message);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut err = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::REQUEST_ID => err.request_id = dec.as_u64(),
            tags::ERROR_CODE => err.code = dec.as_u32(),
            tags::ERROR_MESSAGE => err.message = dec.as_string(),
            _ => {}
        });
        err
    }
}

/// Request id plus one identifier, the shape shared by the creation
/// responses. `tag` selects which identifier field is read.
fn decode_created(payload: &[u8], tag: u8) -> (u64, u64) {
    let (mut request_id, mut id) = (0, 0);
    for_each_field(payload, |dec| {
        if dec.tag() == tags::REQUEST_ID {
            request_id = dec.as_u64();
        } else if dec.tag() == tag {
            id = if tag == tags::FIGURE_ID {
                dec.as_u64()
            } else {
                u64::from(dec.as_u32())
            };
        }
    });
    (request_id, id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureCreated {
    pub request_id: u64,
    pub figure_id: u64,
}

impl FigureCreated {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::with_capacity(26);
        enc.put_u64(tags::REQUEST_ID, self.request_id)
            .put_u64(tags::FIGURE_ID, self.figure_id);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let (request_id, figure_id) = decode_created(payload, tags::FIGURE_ID);
        Self {
            request_id,
            figure_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxesCreated {
    pub request_id: u64,
    pub axes_index: u32,
}

impl AxesCreated {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::with_capacity(22);
        enc.put_u64(tags::REQUEST_ID, self.request_id)
            .put_u32(tags::AXES_INDEX, self.axes_index);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let (request_id, axes_index) = decode_created(payload, tags::AXES_INDEX);
        Self {
            request_id,
            axes_index: axes_index as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesAdded {
    pub request_id: u64,
    pub series_index: u32,
}

impl SeriesAdded {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::with_capacity(22);
        enc.put_u64(tags::REQUEST_ID, self.request_id)
            .put_u32(tags::SERIES_INDEX, self.series_index);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let (request_id, series_index) = decode_created(payload, tags::SERIES_INDEX);
        Self {
            request_id,
            series_index: series_index as u32,
        }
    }
}

/// Repeated FIGURE_IDS fields, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FigureList {
    pub request_id: u64,
    pub figure_ids: Vec<u64>,
}

impl FigureList {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::with_capacity(13 + 13 * self.figure_ids.len());
        enc.put_u64(tags::REQUEST_ID, self.request_id);
        for id in &self.figure_ids {
            enc.put_u64(tags::FIGURE_IDS, *id);
        }
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut list = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::REQUEST_ID => list.request_id = dec.as_u64(),
            tags::FIGURE_IDS => list.figure_ids.push(dec.as_u64()),
            _ => {}
        });
        list
    }
}

/// RESP_SNAPSHOT: a revision and one nested FIGURE_BLOB per figure.
/// Only the figure ids are extracted from each blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub request_id: u64,
    pub revision: u64,
    pub figure_ids: Vec<u64>,
}

impl Snapshot {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::REQUEST_ID, self.request_id)
            .put_u64(tags::REVISION, self.revision);
        for id in &self.figure_ids {
            enc.put_blob(tags::FIGURE_BLOB, &encode_figure_id(*id));
        }
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut snapshot = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::REQUEST_ID => snapshot.request_id = dec.as_u64(),
            tags::REVISION => snapshot.revision = dec.as_u64(),
            tags::FIGURE_BLOB => {
                let mut inner = dec.nested();
                // Axes and series inside the blob carry ids of their own.
                while inner.next() {
                    if inner.tag() == tags::FIGURE_ID {
                        snapshot.figure_ids.push(inner.as_u64());
                        break;
                    }
                }
            }
            _ => {}
        });
        snapshot
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowClosed {
    pub figure_id: u64,
    pub window_id: u64,
    pub reason: String,
}

impl WindowClosed {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u64(tags::WINDOW_ID, self.window_id)
            .put_string(tags::REASON, &self.reason);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut evt = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::FIGURE_ID => evt.figure_id = dec.as_u64(),
            tags::WINDOW_ID => evt.window_id = dec.as_u64(),
            tags::REASON => evt.reason = dec.as_string(),
            _ => {}
        });
        evt
    }
}

/// One server-driven animation frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimTick {
    pub figure_id: u64,
    pub frame_num: u32,
    /// Seconds since the animation started.
    pub t: f32,
    /// Seconds since the previous tick.
    pub dt: f32,
}

impl AnimTick {
    pub fn encode(&self) -> Bytes {
        let mut enc = PayloadEncoder::with_capacity(40);
        enc.put_u64(tags::FIGURE_ID, self.figure_id)
            .put_u32(tags::F1, self.frame_num)
            .put_f32(tags::F2, self.t)
            .put_f32(tags::F3, self.dt);
        enc.take()
    }

    pub fn decode(payload: &[u8]) -> Self {
        let mut tick = Self::default();
        for_each_field(payload, |dec| match dec.tag() {
            tags::FIGURE_ID => tick.figure_id = dec.as_u64(),
            tags::F1 => tick.frame_num = dec.as_u32(),
            tags::F2 => tick.t = dec.as_f32(),
            tags::F3 => tick.dt = dec.as_f32(),
            _ => {}
        });
        tick
    }
}

pub fn encode_blob_release(name: &str) -> Bytes {
    let mut enc = PayloadEncoder::new();
    enc.put_string(tags::BLOB_SHM, name);
    enc.take()
}

/// Segment name, or empty when absent.
pub fn decode_blob_release(payload: &[u8]) -> String {
    let mut dec = PayloadDecoder::new(payload);
    while dec.next() {
        if dec.tag() == tags::BLOB_SHM {
            return dec.as_string();
        }
    }
    String::new()
}

/// Unsolicited message from the daemon.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WindowClosed(WindowClosed),
    FigureDestroyed { figure_id: u64 },
    Tick(AnimTick),
    BlobRelease(String),
    /// Any kind this client does not act on.
    Other(u16),
}

impl Event {
    pub fn from_frame(frame: &Frame) -> Self {
        let payload = frame.payload();
        match frame.msg_type() {
            msg_type::EVT_WINDOW_CLOSED => Event::WindowClosed(WindowClosed::decode(payload)),
            msg_type::EVT_FIGURE_DESTROYED => Event::FigureDestroyed {
                figure_id: decode_figure_id(payload),
            },
            msg_type::ANIM_TICK => Event::Tick(AnimTick::decode(payload)),
            msg_type::BLOB_RELEASE => Event::BlobRelease(decode_blob_release(payload)),
            other => Event::Other(other),
        }
    }
}
