//! Structured media headers and the open header tag space.

use std::collections::BTreeMap;

use crate::{PoolError, PoolResult};

/// Broad media class carried by a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MediaFormat {
    /// Video payload; size may be derived from the geometry headers.
    Video,
    /// Audio payload; size must always be supplied externally.
    Audio,
    /// Opaque data payload; size must always be supplied externally.
    #[default]
    Data,
}

impl MediaFormat {
    /// Raw value used on the wire and across the handle interface.
    pub fn raw(self) -> i64 {
        match self {
            MediaFormat::Video => 0,
            MediaFormat::Audio => 1,
            MediaFormat::Data => 2,
        }
    }

    /// Parses the raw form back; `None` for unknown values.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(MediaFormat::Video),
            1 => Some(MediaFormat::Audio),
            2 => Some(MediaFormat::Data),
            _ => None,
        }
    }
}

/// Pixel layout tag for video frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingFormat {
    /// 8-bit-per-sample blue/green/red/alpha.
    Bgra,
    /// 8-bit-per-sample red/green/blue/alpha.
    Rgba,
    /// Packed blue/green/red.
    Bgr,
    /// Packed red/green/blue.
    Rgb,
    /// Chroma-subsampled YCbCr 4:2:2.
    YCbCr422,
}

impl SamplingFormat {
    /// Samples per pixel used when deriving the media size.
    pub fn channels(self) -> u32 {
        match self {
            SamplingFormat::Bgra | SamplingFormat::Rgba => 4,
            SamplingFormat::Bgr | SamplingFormat::Rgb => 3,
            SamplingFormat::YCbCr422 => 2,
        }
    }

    /// Raw value used on the wire and across the handle interface.
    pub fn raw(self) -> i64 {
        match self {
            SamplingFormat::Bgra => 0,
            SamplingFormat::Rgba => 1,
            SamplingFormat::Bgr => 2,
            SamplingFormat::Rgb => 3,
            SamplingFormat::YCbCr422 => 4,
        }
    }

    /// Parses the raw form back; `None` for unknown values.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(SamplingFormat::Bgra),
            1 => Some(SamplingFormat::Rgba),
            2 => Some(SamplingFormat::Bgr),
            3 => Some(SamplingFormat::Rgb),
            4 => Some(SamplingFormat::YCbCr422),
            _ => None,
        }
    }
}

/// Tag addressing one field of [`FrameHeaders`].
///
/// The space is open: transports may ride their own tags through
/// [`HeaderKind::Other`] without the core knowing them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderKind {
    /// Media class ([`MediaFormat`] raw value).
    MediaFormat,
    /// Payload size in bytes.
    MediaSize,
    /// Video width in pixels.
    Width,
    /// Video height in pixels.
    Height,
    /// Sample depth in bits.
    Depth,
    /// Pixel layout ([`SamplingFormat`] raw value).
    Sampling,
    /// Presentation timestamp.
    Timestamp,
    /// Monotonic frame index assigned by the producer.
    FrameIndex,
    /// Extension tag owned by a transport or header registry.
    Other(u32),
}

/// Structured headers attached to every frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameHeaders {
    /// Media class of the payload.
    pub media_format: MediaFormat,
    /// Payload size in bytes.
    pub media_size: u64,
    /// Video width in pixels; zero when not applicable.
    pub width: u32,
    /// Video height in pixels; zero when not applicable.
    pub height: u32,
    /// Sample depth in bits; zero when not applicable.
    pub depth: u32,
    /// Pixel layout; `None` when unknown or not applicable.
    pub sampling: Option<SamplingFormat>,
    /// Presentation timestamp.
    pub timestamp: i64,
    /// Producer-assigned frame index.
    pub frame_index: i64,
    extra: BTreeMap<u32, i64>,
}

impl FrameHeaders {
    /// Derived video size in bytes, when the geometry headers allow it.
    ///
    /// `bytes = width * height * depth * channels / 8`; channels come from
    /// the sampling format. Returns `None` for unknown sampling or missing
    /// geometry — callers must then supply the size externally.
    pub fn derived_media_size(&self) -> Option<u64> {
        let sampling = self.sampling?;
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return None;
        }
        let pixel_bits = u64::from(self.depth) * u64::from(sampling.channels());
        Some(u64::from(self.width) * u64::from(self.height) * pixel_bits / 8)
    }

    /// Extension entries stored under [`HeaderKind::Other`] tags, in tag
    /// order.
    pub fn extra_entries(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.extra.iter().map(|(tag, value)| (*tag, *value))
    }

    /// Reads the field addressed by `kind` in raw integer form.
    pub fn get(&self, kind: HeaderKind) -> Option<i64> {
        match kind {
            HeaderKind::MediaFormat => Some(self.media_format.raw()),
            HeaderKind::MediaSize => Some(self.media_size as i64),
            HeaderKind::Width => Some(i64::from(self.width)),
            HeaderKind::Height => Some(i64::from(self.height)),
            HeaderKind::Depth => Some(i64::from(self.depth)),
            HeaderKind::Sampling => self.sampling.map(SamplingFormat::raw),
            HeaderKind::Timestamp => Some(self.timestamp),
            HeaderKind::FrameIndex => Some(self.frame_index),
            HeaderKind::Other(tag) => self.extra.get(&tag).copied(),
        }
    }

    /// Stores `value` into the field addressed by `kind`.
    ///
    /// Enum-backed fields reject raw values outside their range; dimension
    /// fields reject values that do not fit their width.
    pub fn set(&mut self, kind: HeaderKind, value: i64) -> PoolResult<()> {
        let reject = || PoolError::BadHeaderValue { kind, value };
        match kind {
            HeaderKind::MediaFormat => {
                self.media_format = MediaFormat::from_raw(value).ok_or_else(reject)?;
            }
            HeaderKind::MediaSize => {
                self.media_size = u64::try_from(value).map_err(|_| reject())?;
            }
            HeaderKind::Width => {
                self.width = u32::try_from(value).map_err(|_| reject())?;
            }
            HeaderKind::Height => {
                self.height = u32::try_from(value).map_err(|_| reject())?;
            }
            HeaderKind::Depth => {
                self.depth = u32::try_from(value).map_err(|_| reject())?;
            }
            HeaderKind::Sampling => {
                self.sampling = Some(SamplingFormat::from_raw(value).ok_or_else(reject)?);
            }
            HeaderKind::Timestamp => self.timestamp = value,
            HeaderKind::FrameIndex => self.frame_index = value,
            HeaderKind::Other(tag) => {
                self.extra.insert(tag, value);
            }
        }
        Ok(())
    }
}

/// Init data handed to `FramePool::acquire_with_init`.
///
/// Fields left `None` stay at their header defaults. Validation happens
/// before any slot is touched; see [`FrameInit::resolve`].
#[derive(Clone, Debug, Default)]
pub struct FrameInit {
    /// Media class of the payload.
    pub media_format: MediaFormat,
    /// Explicit payload size in bytes, when the producer knows it.
    pub media_size: Option<u64>,
    /// Video width in pixels.
    pub width: Option<u32>,
    /// Video height in pixels.
    pub height: Option<u32>,
    /// Sample depth in bits.
    pub depth: Option<u32>,
    /// Pixel layout.
    pub sampling: Option<SamplingFormat>,
    /// Presentation timestamp.
    pub timestamp: Option<i64>,
    /// Producer-assigned frame index.
    pub frame_index: Option<i64>,
}

impl FrameInit {
    /// Init for a video frame whose size derives from its geometry.
    pub fn video(width: u32, height: u32, depth: u32, sampling: SamplingFormat) -> Self {
        FrameInit {
            media_format: MediaFormat::Video,
            width: Some(width),
            height: Some(height),
            depth: Some(depth),
            sampling: Some(sampling),
            ..FrameInit::default()
        }
    }

    /// Init for an audio frame; the size must be supplied.
    pub fn audio(media_size: u64) -> Self {
        FrameInit {
            media_format: MediaFormat::Audio,
            media_size: Some(media_size),
            ..FrameInit::default()
        }
    }

    /// Validates the init data and resolves it into concrete headers.
    ///
    /// Video: a supplied size must match the derived size when the full
    /// geometry is present; with unknown sampling or missing geometry an
    /// explicit size is required. Audio and data payloads always require an
    /// explicit, non-zero size — deriving one is an error.
    pub fn resolve(&self) -> PoolResult<FrameHeaders> {
        let mut headers = FrameHeaders {
            media_format: self.media_format,
            media_size: 0,
            width: self.width.unwrap_or(0),
            height: self.height.unwrap_or(0),
            depth: self.depth.unwrap_or(0),
            sampling: self.sampling,
            timestamp: self.timestamp.unwrap_or(0),
            frame_index: self.frame_index.unwrap_or(0),
            ..FrameHeaders::default()
        };

        let size = match self.media_format {
            MediaFormat::Video => {
                let derived = headers.derived_media_size();
                match (self.media_size, derived) {
                    (Some(size), Some(derived)) if size != derived => {
                        return Err(PoolError::InvalidInit(format!(
                            "media size {size} does not match derived size {derived}"
                        )));
                    }
                    (Some(size), _) => size,
                    (None, Some(derived)) => derived,
                    (None, None) => {
                        return Err(PoolError::InvalidInit(
                            "video frame needs full geometry or an explicit size".into(),
                        ));
                    }
                }
            }
            MediaFormat::Audio | MediaFormat::Data => match self.media_size {
                Some(size) if size > 0 => size,
                _ => {
                    return Err(PoolError::InvalidInit(
                        "audio/data frames require an explicit non-zero size".into(),
                    ));
                }
            },
        };

        headers.media_size = size;
        Ok(headers)
    }
}
