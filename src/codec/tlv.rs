//! Tag-length-value payload codec.
//!
//! Every field is `[tag: u8][len: u32 LE][value: len bytes]`. Scalars are
//! little-endian; `bool` travels as a `u16`, floats as their bit patterns.
//! A float array is a blob whose content is `[count: u32][count × f32]`.
//!
//! # Example
//!
//! ```
//! use spectra_client::codec::{PayloadDecoder, PayloadEncoder};
//!
//! let mut enc = PayloadEncoder::new();
//! enc.put_u64(0x40, 7).put_string(0x60, "Test");
//! let payload = enc.take();
//!
//! let mut dec = PayloadDecoder::new(&payload);
//! assert!(dec.next());
//! assert_eq!(dec.as_u64(), 7);
//! assert!(dec.next());
//! assert_eq!(dec.as_string(), "Test");
//! assert!(!dec.next());
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the per-field prefix (tag + length).
pub const FIELD_HEADER_SIZE: usize = 5;

/// Append-only TLV builder.
#[derive(Debug, Default)]
pub struct PayloadEncoder {
    buf: BytesMut,
}

impl PayloadEncoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with room for `capacity` payload bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    // Field values are bounded by the transport's payload limit, far below u32::MAX.
    #[inline]
    fn put_field_header(&mut self, tag: u8, len: usize) {
        self.buf.put_u8(tag);
        self.buf.put_u32_le(len as u32);
    }

    pub fn put_u16(&mut self, tag: u8, value: u16) -> &mut Self {
        self.put_field_header(tag, 2);
        self.buf.put_u16_le(value);
        self
    }

    pub fn put_u32(&mut self, tag: u8, value: u32) -> &mut Self {
        self.put_field_header(tag, 4);
        self.buf.put_u32_le(value);
        self
    }

    pub fn put_u64(&mut self, tag: u8, value: u64) -> &mut Self {
        self.put_field_header(tag, 8);
        self.buf.put_u64_le(value);
        self
    }

    /// UTF-8 bytes, no terminator.
    pub fn put_string(&mut self, tag: u8, value: &str) -> &mut Self {
        self.put_blob(tag, value.as_bytes())
    }

    /// Encoded as a `u16` holding 0 or 1.
    pub fn put_bool(&mut self, tag: u8, value: bool) -> &mut Self {
        self.put_u16(tag, u16::from(value))
    }

    pub fn put_f32(&mut self, tag: u8, value: f32) -> &mut Self {
        self.put_u32(tag, value.to_bits())
    }

    pub fn put_f64(&mut self, tag: u8, value: f64) -> &mut Self {
        self.put_u64(tag, value.to_bits())
    }

    pub fn put_blob(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.put_field_header(tag, value.len());
        self.buf.put_slice(value);
        self
    }

    /// `[count][count × f32]` blob.
    pub fn put_float_array(&mut self, tag: u8, values: &[f32]) -> &mut Self {
        self.put_field_header(tag, 4 + values.len() * 4);
        self.buf.put_u32_le(values.len() as u32);
        for v in values {
            self.buf.put_f32_le(*v);
        }
        self
    }

    /// Float-array blob from bytes already packed as little-endian `f32`s.
    pub fn put_float_array_raw(&mut self, tag: u8, count: u32, raw: &[u8]) -> &mut Self {
        self.put_field_header(tag, 4 + raw.len());
        self.buf.put_u32_le(count);
        self.buf.put_slice(raw);
        self
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish and hand out the payload.
    pub fn take(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Forward-only TLV reader.
///
/// `next()` stops at the end of the buffer or at the first field whose
/// declared length runs past it. Accessors are best effort: a value too
/// short for the requested interpretation yields zero or empty. Callers
/// that need strictness should check [`field_len`](Self::field_len).
#[derive(Debug, Clone)]
pub struct PayloadDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    tag: u8,
    value: &'a [u8],
}

impl<'a> PayloadDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            tag: 0,
            value: &[],
        }
    }

    /// Advance to the next field. Returns false at the end or on truncation.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let remaining = self.data.len().saturating_sub(self.pos);
        if remaining < FIELD_HEADER_SIZE {
            return false;
        }
        let at = self.pos;
        let len = u32::from_le_bytes([
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
            self.data[at + 4],
        ]) as usize;
        let start = at + FIELD_HEADER_SIZE;
        let end = match start.checked_add(len) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                self.pos = self.data.len();
                return false;
            }
        };
        self.tag = self.data[at];
        self.value = &self.data[start..end];
        self.pos = end;
        true
    }

    /// Tag of the current field.
    #[inline]
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Declared length of the current field's value.
    #[inline]
    pub fn field_len(&self) -> usize {
        self.value.len()
    }

    pub fn as_u16(&self) -> u16 {
        match self.value.get(..2) {
            Some(b) => u16::from_le_bytes([b[0], b[1]]),
            None => 0,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self.value.get(..4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            None => 0,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self.value.get(..8) {
            Some(b) => {
                let mut word = [0u8; 8];
                word.copy_from_slice(b);
                u64::from_le_bytes(word)
            }
            None => 0,
        }
    }

    pub fn as_bool(&self) -> bool {
        self.as_u16() != 0
    }

    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.as_u32())
    }

    pub fn as_f64(&self) -> f64 {
        f64::from_bits(self.as_u64())
    }

    /// Lossy UTF-8.
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(self.value).into_owned()
    }

    pub fn as_blob(&self) -> &'a [u8] {
        self.value
    }

    /// Empty when the blob is shorter than its declared element count.
    pub fn as_float_array(&self) -> Vec<f32> {
        let Some(count) = self.value.get(..4) else {
            return Vec::new();
        };
        let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize;
        let body = &self.value[4..];
        match count.checked_mul(4) {
            Some(need) if need <= body.len() => body[..need]
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Decoder over the current field's value.
    pub fn nested(&self) -> PayloadDecoder<'a> {
        PayloadDecoder::new(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut enc = PayloadEncoder::new();
        enc.put_u16(1, 0)
            .put_u16(2, u16::MAX)
            .put_u32(3, u32::MAX)
            .put_u64(4, u64::MAX)
            .put_u64(5, 0)
            .put_bool(6, true)
            .put_bool(7, false);
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload);
        assert!(dec.next());
        assert_eq!((dec.tag(), dec.as_u16()), (1, 0));
        assert!(dec.next());
        assert_eq!(dec.as_u16(), u16::MAX);
        assert!(dec.next());
        assert_eq!(dec.as_u32(), u32::MAX);
        assert!(dec.next());
        assert_eq!(dec.as_u64(), u64::MAX);
        assert!(dec.next());
        assert_eq!(dec.as_u64(), 0);
        assert!(dec.next());
        assert!(dec.as_bool());
        assert_eq!(dec.field_len(), 2);
        assert!(dec.next());
        assert!(!dec.as_bool());
        assert!(!dec.next());
    }

    #[test]
    fn test_float_bits_preserved() {
        let values32 = [0.0f32, -0.0, 1.5, f32::MAX, f32::MIN_POSITIVE, f32::INFINITY];
        let values64 = [0.0f64, -0.0, 1.0 / 3.0, f64::MAX, f64::NEG_INFINITY];

        let mut enc = PayloadEncoder::new();
        for v in values32 {
            enc.put_f32(0x83, v);
        }
        for v in values64 {
            enc.put_f64(0x84, v);
        }
        enc.put_f32(0x85, f32::NAN);
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload);
        for v in values32 {
            assert!(dec.next());
            assert_eq!(dec.as_f32().to_bits(), v.to_bits());
        }
        for v in values64 {
            assert!(dec.next());
            assert_eq!(dec.as_f64().to_bits(), v.to_bits());
        }
        assert!(dec.next());
        assert_eq!(dec.as_f32().to_bits(), f32::NAN.to_bits());
    }

    #[test]
    fn test_strings_and_blobs() {
        let mut enc = PayloadEncoder::new();
        enc.put_string(0x60, "")
            .put_string(0x60, "héllo")
            .put_blob(0xB0, &[])
            .put_blob(0xB0, &[1, 2, 3]);
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload);
        assert!(dec.next());
        assert_eq!(dec.as_string(), "");
        assert!(dec.next());
        assert_eq!(dec.as_string(), "héllo");
        assert!(dec.next());
        assert!(dec.as_blob().is_empty());
        assert!(dec.next());
        assert_eq!(dec.as_blob(), &[1, 2, 3]);
    }

    #[test]
    fn test_float_array_roundtrip() {
        let data = [1.0f32, -2.5, 3.25, f32::MAX];
        let mut enc = PayloadEncoder::new();
        enc.put_float_array(0xB0, &data).put_float_array(0xB0, &[]);
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload);
        assert!(dec.next());
        assert_eq!(dec.field_len(), 4 + 16);
        assert_eq!(dec.as_float_array(), data);
        assert!(dec.next());
        assert_eq!(dec.field_len(), 4);
        assert!(dec.as_float_array().is_empty());
    }

    #[test]
    fn test_float_array_raw_matches_typed() {
        let data = [0.5f32, 1.5, 2.5];
        let raw: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();

        let mut typed = PayloadEncoder::new();
        typed.put_float_array(0xB0, &data);
        let mut packed = PayloadEncoder::new();
        packed.put_float_array_raw(0xB0, 3, &raw);

        assert_eq!(typed.take(), packed.take());
    }

    #[test]
    fn test_float_array_count_exceeds_body() {
        let mut enc = PayloadEncoder::new();
        enc.put_float_array_raw(0xB0, 10, &1.0f32.to_le_bytes());
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload);
        assert!(dec.next());
        assert!(dec.as_float_array().is_empty());
    }

    #[test]
    fn test_unknown_tags_are_skipped() {
        let mut enc = PayloadEncoder::new();
        enc.put_u64(0x40, 11)
            .put_blob(0xEE, b"future field")
            .put_string(0x60, "kept");
        let payload = enc.take();

        let mut figure_id = 0;
        let mut title = String::new();
        let mut dec = PayloadDecoder::new(&payload);
        while dec.next() {
            match dec.tag() {
                0x40 => figure_id = dec.as_u64(),
                0x60 => title = dec.as_string(),
                _ => {}
            }
        }
        assert_eq!(figure_id, 11);
        assert_eq!(title, "kept");
    }

    #[test]
    fn test_repeated_tags_keep_order() {
        let mut enc = PayloadEncoder::new();
        for id in [3u64, 1, 2] {
            enc.put_u64(0x41, id);
        }
        let payload = enc.take();

        let mut ids = Vec::new();
        let mut dec = PayloadDecoder::new(&payload);
        while dec.next() {
            ids.push(dec.as_u64());
        }
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_truncated_field_stops() {
        let mut enc = PayloadEncoder::new();
        enc.put_u32(1, 5).put_u64(2, 9);
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload[..payload.len() - 1]);
        assert!(dec.next());
        assert_eq!(dec.as_u32(), 5);
        assert!(!dec.next());
        assert!(!dec.next());

        let mut partial_header = PayloadDecoder::new(&payload[..3]);
        assert!(!partial_header.next());
    }

    #[test]
    fn test_huge_declared_length() {
        let bytes = [0x40, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        let mut dec = PayloadDecoder::new(&bytes);
        assert!(!dec.next());
    }

    #[test]
    fn test_short_value_yields_default() {
        let mut enc = PayloadEncoder::new();
        enc.put_u16(0x40, 0xFFFF);
        let payload = enc.take();

        let mut dec = PayloadDecoder::new(&payload);
        assert!(dec.next());
        assert_eq!(dec.as_u64(), 0);
        assert_eq!(dec.as_u32(), 0);
        assert_eq!(dec.as_u16(), 0xFFFF);
    }

    #[test]
    fn test_nested_decoder() {
        let mut inner = PayloadEncoder::new();
        inner.put_u64(0x40, 42);
        let inner = inner.take();

        let mut outer = PayloadEncoder::new();
        outer.put_u64(0x50, 1).put_blob(0x53, &inner);
        let payload = outer.take();

        let mut dec = PayloadDecoder::new(&payload);
        assert!(dec.next());
        assert!(dec.next());
        let mut nested = dec.nested();
        assert!(nested.next());
        assert_eq!((nested.tag(), nested.as_u64()), (0x40, 42));
    }

    #[test]
    fn test_empty_payload() {
        let enc = PayloadEncoder::with_capacity(16);
        assert!(enc.is_empty());
        let payload = enc.take();
        assert!(!PayloadDecoder::new(&payload).next());
    }
}
