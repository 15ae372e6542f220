//! Reference-counted media frame pool addressed by opaque handles.
//!
//! This crate holds the foundational pieces of the routing core:
//! * [`FrameHeaders`] – structured media headers with an open tag space.
//! * [`Frame`] – a media buffer plus its headers.
//! * [`FramePool`] – a bounded slot table handing out [`FrameHandle`]s with
//!   addref/release lifecycle under a single mutex.
//! * [`PoolError`] – typed error surface for exhaustion and bad init data.
//!
//! Producers acquire a frame, fill its buffer, and hand the handle to the
//! transport layer; every party that retains the handle holds a reference.
//! The slot table never reassigns a handle while the frame is live.

mod error;
mod frame;
mod headers;
mod pool;

pub use error::{PoolError, PoolResult};
pub use frame::Frame;
pub use headers::{FrameHeaders, FrameInit, HeaderKind, MediaFormat, SamplingFormat};
pub use pool::{FramePool, DEFAULT_MAX_FRAMES};

use std::fmt;

/// Opaque key identifying a live frame inside a [`FramePool`].
///
/// Handles are strictly increasing during a run and are never reused while
/// the frame they name is live. The invalid sentinel is a reserved negative
/// value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(i64);

impl FrameHandle {
    /// Sentinel denoting "no frame".
    pub const INVALID: FrameHandle = FrameHandle(-1);

    /// Rehydrates a handle from its raw integer form.
    pub fn from_raw(raw: i64) -> Self {
        FrameHandle(raw)
    }

    /// Raw integer form, as carried across the public interface.
    pub fn raw(self) -> i64 {
        self.0
    }

    /// True unless this is the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
