//! Status records serialised for the control channel.

use serde::Serialize;

use pin_fabric::{PinMetricsSnapshot, Polarity};

use crate::ModuleState;

/// One pin's slice of a status report.
#[derive(Clone, Debug, Serialize)]
pub struct PinStatus {
    /// Raw pin handle.
    pub handle: i32,
    /// Pin direction.
    pub polarity: Polarity,
    /// Transport kind the pin runs on.
    pub kind: String,
    /// Counter snapshot.
    pub metrics: PinMetricsSnapshot,
}

/// Reply body for the `STATUS` control command.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleStatus {
    /// Raw module handle.
    pub module: i32,
    /// Lifecycle state at snapshot time.
    pub state: ModuleState,
    /// Input pins in declaration order.
    pub inputs: Vec<PinStatus>,
    /// Output pins in declaration order.
    pub outputs: Vec<PinStatus>,
    /// Slots currently in the shared frame list.
    pub frames_in_list: usize,
}
