//! Fixed-width framing shared by every byte-oriented transport.
//!
//! A framing unit is a little-endian header block, a run of extension
//! entries, then the payload. The header mirrors the structured frame
//! headers field for field so a receiving pin can size its pool frame
//! before touching the payload.

use frame_pool::{FrameHeaders, HeaderKind, MediaFormat};

use crate::{TransportError, TransportResult};

/// Magic word opening every framing unit.
pub const WIRE_MAGIC: u32 = 0x4652_4D45; // "FRME"
/// Current framing version.
pub const WIRE_VERSION: u16 = 1;
/// Fixed header length in bytes, before extension entries.
pub const WIRE_HEADER_LEN: usize = 56;
/// Length of one extension entry (tag + value).
const EXT_ENTRY_LEN: usize = 12;
/// Sampling slot value meaning "not set".
const SAMPLING_UNSET: u32 = u32::MAX;

/// Decoded framing unit: resolved headers plus the payload bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct WireFrame {
    /// Headers reconstructed from the wire block.
    pub headers: FrameHeaders,
    /// Payload bytes as received.
    pub payload: Vec<u8>,
}

/// Encodes headers and payload into one framing unit.
pub fn encode(headers: &FrameHeaders, payload: &[u8]) -> Vec<u8> {
    let extras: Vec<(u32, i64)> = headers.extra_entries().collect();
    let mut out = Vec::with_capacity(WIRE_HEADER_LEN + extras.len() * EXT_ENTRY_LEN + payload.len());

    out.extend_from_slice(&WIRE_MAGIC.to_le_bytes());
    out.extend_from_slice(&WIRE_VERSION.to_le_bytes());
    out.extend_from_slice(&(extras.len() as u16).to_le_bytes());
    out.extend_from_slice(&(headers.media_format.raw() as u32).to_le_bytes());
    out.extend_from_slice(&headers.width.to_le_bytes());
    out.extend_from_slice(&headers.height.to_le_bytes());
    out.extend_from_slice(&headers.depth.to_le_bytes());
    let sampling = headers
        .sampling
        .map(|s| s.raw() as u32)
        .unwrap_or(SAMPLING_UNSET);
    out.extend_from_slice(&sampling.to_le_bytes());
    out.extend_from_slice(&headers.media_size.to_le_bytes());
    out.extend_from_slice(&headers.timestamp.to_le_bytes());
    out.extend_from_slice(&headers.frame_index.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    debug_assert_eq!(out.len(), WIRE_HEADER_LEN);

    for (tag, value) in extras {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Decodes one framing unit, validating magic, version and length.
pub fn decode(bytes: &[u8]) -> TransportResult<WireFrame> {
    if bytes.len() < WIRE_HEADER_LEN {
        return Err(TransportError::Codec("framing unit shorter than header"));
    }

    let mut cursor = Cursor { bytes, at: 0 };
    if cursor.u32() != WIRE_MAGIC {
        return Err(TransportError::Codec("bad magic"));
    }
    if cursor.u16() != WIRE_VERSION {
        return Err(TransportError::Codec("unsupported framing version"));
    }
    let ext_count = cursor.u16() as usize;

    let media_format = MediaFormat::from_raw(i64::from(cursor.u32()))
        .ok_or(TransportError::Codec("unknown media format"))?;
    let width = cursor.u32();
    let height = cursor.u32();
    let depth = cursor.u32();
    let sampling_raw = cursor.u32();
    let media_size = cursor.u64();
    let timestamp = cursor.i64();
    let frame_index = cursor.i64();
    let payload_len = cursor.u32() as usize;

    let expected = WIRE_HEADER_LEN + ext_count * EXT_ENTRY_LEN + payload_len;
    if bytes.len() != expected {
        return Err(TransportError::Codec("framing unit length mismatch"));
    }

    let mut headers = FrameHeaders::default();
    headers.media_format = media_format;
    headers.media_size = media_size;
    headers.width = width;
    headers.height = height;
    headers.depth = depth;
    headers.timestamp = timestamp;
    headers.frame_index = frame_index;
    if sampling_raw != SAMPLING_UNSET {
        headers
            .set(HeaderKind::Sampling, i64::from(sampling_raw))
            .map_err(|_| TransportError::Codec("unknown sampling format"))?;
    }
    for _ in 0..ext_count {
        let tag = cursor.u32();
        let value = cursor.i64();
        // Extension stores cannot fail; Other tags accept any value.
        let _ = headers.set(HeaderKind::Other(tag), value);
    }

    let payload = bytes[cursor.at..].to_vec();
    Ok(WireFrame { headers, payload })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.at..self.at + N]);
        self.at += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }
}
