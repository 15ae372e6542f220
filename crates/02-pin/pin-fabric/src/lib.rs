//! Polymorphic input/output pins over variant transports.
//!
//! A pin is one typed endpoint of a module: input pins own a receive thread
//! that turns framing units into pooled frames and hands them to the user
//! callback; output pins own a FIFO send queue drained by a transmit thread.
//! The concrete carrier behind a pin is resolved through a
//! [`TransportRegistry`] keyed by the pin's `type` config value — the core
//! ships only the in-process `queue` transport, everything else plugs in.

mod config;
mod error;
mod input;
mod metrics;
mod output;
mod queue;
mod transport;
pub mod wire;

pub use config::KvConfig;
pub use error::{PinError, PinResult, TransportError, TransportResult};
pub use input::{InputContext, InputPin};
pub use metrics::{PinMetrics, PinMetricsSnapshot};
pub use output::{OutputPin, OutputSender, SendOutcome};
pub use queue::{QueueTransportFactory, QUEUE_KIND};
pub use transport::{
    BackpressurePolicy, InputTransport, OutputParam, OutputTransport, TransportDescriptor,
    TransportFactory, TransportRegistry,
};

use std::fmt;
use std::sync::Arc;

pub use frame_pool::FrameHandle;

/// Key identifying a pin within its owning module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinHandle(i32);

impl PinHandle {
    /// Sentinel denoting "no pin".
    pub const INVALID: PinHandle = PinHandle(-1);

    /// Rehydrates a handle from its raw integer form.
    pub fn from_raw(raw: i32) -> Self {
        PinHandle(raw)
    }

    /// Raw integer form, as carried across the public interface.
    pub fn raw(self) -> i32 {
        self.0
    }

    /// True unless this is the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for PinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying a module within the process-wide registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleHandle(i32);

impl ModuleHandle {
    /// Sentinel denoting "no module".
    pub const INVALID: ModuleHandle = ModuleHandle(-1);

    /// Rehydrates a handle from its raw integer form.
    pub fn from_raw(raw: i32) -> Self {
        ModuleHandle(raw)
    }

    /// Raw integer form, as carried across the public interface.
    pub fn raw(self) -> i32 {
        self.0
    }

    /// True unless this is the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a pin relative to its module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Polarity {
    /// The pin ingests frames from its transport.
    Input,
    /// The pin emits frames through its transport.
    Output,
}

/// Command delivered through the module callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinCommand {
    /// The module started; no frame attached.
    Start,
    /// The module stopped; no frame attached.
    Stop,
    /// A pin hit an unrecoverable transport failure; no frame attached.
    Quit,
    /// A frame arrived on an input pin; the frame handle is live for the
    /// duration of the callback.
    Tick,
}

/// One callback invocation's worth of context.
#[derive(Clone, Copy, Debug)]
pub struct PinEvent {
    /// Opaque value supplied at module creation, propagated verbatim.
    pub user_data: usize,
    /// Module the event belongs to.
    pub module: ModuleHandle,
    /// Pin the event belongs to; invalid for module-level events.
    pub pin: PinHandle,
    /// Live frame for [`PinCommand::Tick`], invalid otherwise. Callbacks
    /// that retain the handle past their return must addref it first.
    pub frame: FrameHandle,
    /// What happened.
    pub command: PinCommand,
}

/// Callback delivering frames and lifecycle events to user code.
///
/// Runs on the input pin's receive thread. It must not call back into its
/// own module's lifecycle operations.
pub type FrameCallback = Arc<dyn Fn(PinEvent) + Send + Sync>;
