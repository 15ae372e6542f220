use thiserror::Error;

use frame_pool::FrameHandle;
use pin_fabric::{ModuleHandle, PinError, PinHandle, TransportError};

/// Result alias for controller operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors raised by the module controller and registry.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Propagated pin failure.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// Propagated transport failure during pin construction.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The module was closed; close is terminal.
    #[error("module is closed")]
    Closed,

    /// The handle names no module in the registry.
    #[error("unknown module handle {0}")]
    UnknownModule(ModuleHandle),

    /// The handle names no output pin on this module.
    #[error("unknown output pin {0}")]
    UnknownPin(PinHandle),

    /// A frame handle the pool does not know was handed to `send`.
    #[error("unknown frame handle {0}")]
    UnknownFrame(FrameHandle),

    /// A pin index accessor ran past the pin list.
    #[error("pin index {index} out of range ({count} pins)")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Pins actually present.
        count: usize,
    },

    /// The control channel could not bind its socket.
    #[error("control channel failed to bind port {port}: {source}")]
    ControlBind {
        /// Configured control port.
        port: u16,
        /// Underlying bind failure.
        source: std::io::Error,
    },

    /// A lifecycle operation was invoked from inside the module callback.
    #[error("lifecycle operations may not be called from the module callback")]
    ReentrantCall,
}
