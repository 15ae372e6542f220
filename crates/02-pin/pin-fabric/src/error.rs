use thiserror::Error;

use frame_pool::{FrameHandle, PoolError};

/// Result alias for transport-level operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result alias for pin-level operations.
pub type PinResult<T> = Result<T, PinError>;

/// Errors raised by transports and the wire codec.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer side of the carrier is gone.
    #[error("transport closed")]
    Closed,

    /// A framing unit failed to decode.
    #[error("malformed wire frame: {0}")]
    Codec(&'static str),

    /// The pin configuration is missing or contradicts what the transport
    /// needs.
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),

    /// No factory is registered for the requested `type` value.
    #[error("unknown transport type '{0}'")]
    UnknownKind(String),

    /// Carrier-level I/O failure.
    #[error("transport i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by pin lifecycle and send paths.
#[derive(Debug, Error)]
pub enum PinError {
    /// Propagated transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Propagated frame pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// `send` was given a handle the pool does not know.
    #[error("unknown frame handle {0}")]
    UnknownFrame(FrameHandle),

    /// The operation needs a started pin.
    #[error("pin is not started")]
    NotStarted,

    /// The pin's worker is gone; the queue no longer accepts work.
    #[error("pin is stopped")]
    Stopped,

    /// OS refused the worker thread.
    #[error("failed to spawn pin worker: {0}")]
    Spawn(std::io::Error),
}
