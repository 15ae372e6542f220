//! A single media frame: headers plus the payload buffer.

use crate::{FrameHeaders, HeaderKind, PoolResult};

/// Media buffer with its structured headers.
///
/// Frames live inside pool slots; the buffer allocation belongs to the slot
/// and survives release-for-reuse, so a handle holder never observes the
/// payload moving underneath a live reference.
#[derive(Debug, Default)]
pub struct Frame {
    headers: FrameHeaders,
    buffer: Vec<u8>,
}

impl Frame {
    pub(crate) fn create(headers: FrameHeaders) -> Self {
        let mut frame = Frame::default();
        frame.reset(headers);
        frame
    }

    /// Replaces the headers and resizes the buffer for a reused slot.
    ///
    /// The backing allocation is kept when it already fits.
    pub(crate) fn reset(&mut self, headers: FrameHeaders) {
        self.buffer.resize(headers.media_size as usize, 0);
        self.headers = headers;
    }

    /// Structured headers of this frame.
    pub fn headers(&self) -> &FrameHeaders {
        &self.headers
    }

    /// Payload size in bytes.
    pub fn media_size(&self) -> u64 {
        self.headers.media_size
    }

    /// Payload bytes.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable payload bytes.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Reads one header field in raw form.
    pub fn get_header(&self, kind: HeaderKind) -> Option<i64> {
        self.headers.get(kind)
    }

    /// Stores one header field from raw form.
    ///
    /// Growing [`HeaderKind::MediaSize`] resizes the buffer to match, so the
    /// size header and the allocation never disagree.
    pub fn set_header(&mut self, kind: HeaderKind, value: i64) -> PoolResult<()> {
        self.headers.set(kind, value)?;
        if kind == HeaderKind::MediaSize {
            self.buffer.resize(self.headers.media_size as usize, 0);
        }
        Ok(())
    }
}
