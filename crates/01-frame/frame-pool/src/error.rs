use thiserror::Error;

use crate::{FrameHandle, HeaderKind};

/// Result alias used throughout the pool crate.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by the frame pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Acquire was attempted while every slot up to the cap is live.
    #[error("frame pool exhausted: all {cap} slots are live")]
    Exhausted {
        /// Configured slot cap at the time of the failed acquire.
        cap: usize,
    },

    /// Init data failed validation before any slot was touched.
    #[error("invalid frame init: {0}")]
    InvalidInit(String),

    /// The handle names no live frame in the pool.
    #[error("unknown frame handle {0}")]
    NotFound(FrameHandle),

    /// A header field rejected the value it was asked to store.
    #[error("header {kind:?} rejects value {value}")]
    BadHeaderValue {
        /// Header tag the store was aimed at.
        kind: HeaderKind,
        /// Offending raw value.
        value: i64,
    },
}
