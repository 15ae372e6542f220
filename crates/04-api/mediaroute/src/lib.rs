//! Handle-based public surface of the media routing core.
//!
//! Applications drive everything through opaque integer handles: modules,
//! pins, and frames. No pointer crosses the interface, and no error is
//! thrown across it either — exceptional paths fold into sentinel returns
//! (invalid handle, `-1`) plus a log entry, so hosts in any language can sit
//! on top of this surface.
//!
//! Operations exist in two equivalent forms: methods on an explicit
//! [`Context`], and free functions bound to the process-wide context for
//! hosts that want the classic singleton shape.

mod context;

pub use context::{Context, GlobalParam};

pub use frame_pool::{
    FrameHandle, FrameHeaders, FrameInit, HeaderKind, MediaFormat, SamplingFormat,
    DEFAULT_MAX_FRAMES,
};
pub use module_hub::{ModuleStatus, PinStatus};
pub use pin_fabric::{
    FrameCallback, InputTransport, ModuleHandle, OutputParam, OutputTransport, PinCommand,
    PinEvent, PinHandle, TransportDescriptor, TransportFactory, TransportRegistry,
};

use std::sync::OnceLock;

static GLOBAL: OnceLock<Context> = OnceLock::new();

/// The process-wide context backing the free-function surface.
///
/// Created on first use with the default pool cap and the built-in
/// transport set.
pub fn global() -> &'static Context {
    GLOBAL.get_or_init(Context::new)
}

/// Creates a module from a flat config string. See [`Context::create_module`].
pub fn create_module(
    port: u16,
    callback: FrameCallback,
    config: &str,
    user_data: usize,
) -> ModuleHandle {
    global().create_module(port, callback, config, user_data)
}

/// [`create_module`] with a caller-supplied transport registry.
pub fn create_module_ext(
    port: u16,
    callback: FrameCallback,
    config: &str,
    user_data: usize,
    transports: &TransportRegistry,
) -> ModuleHandle {
    global().create_module_ext(port, callback, config, user_data, transports)
}

/// Starts a module. Returns 0, or -1 with a log entry.
pub fn start_module(module: ModuleHandle) -> i32 {
    global().start_module(module)
}

/// Stops a module. Returns 0, or -1 with a log entry.
pub fn stop_module(module: ModuleHandle) -> i32 {
    global().stop_module(module)
}

/// Closes a module and removes it from the registry.
pub fn close(module: ModuleHandle) -> i32 {
    global().close(module)
}

/// Number of input pins, or -1 for an unknown module.
pub fn get_input_count(module: ModuleHandle) -> i32 {
    global().get_input_count(module)
}

/// Number of output pins, or -1 for an unknown module.
pub fn get_output_count(module: ModuleHandle) -> i32 {
    global().get_output_count(module)
}

/// Handle of the `index`-th input pin, or the invalid handle.
pub fn get_input_handle(module: ModuleHandle, index: usize) -> PinHandle {
    global().get_input_handle(module, index)
}

/// Handle of the `index`-th output pin, or the invalid handle.
pub fn get_output_handle(module: ModuleHandle, index: usize) -> PinHandle {
    global().get_output_handle(module, index)
}

/// Applies a parameter update to an output pin.
pub fn set_output_parameter(
    module: ModuleHandle,
    output: PinHandle,
    param: OutputParam,
    value: i64,
) -> i32 {
    global().set_output_parameter(module, output, param, value)
}

/// Enqueues a frame on an output pin. See [`Context::send`].
pub fn send(module: ModuleHandle, output: PinHandle, frame: FrameHandle) -> i32 {
    global().send(module, output, frame)
}

/// Acquires an empty frame from the pool.
pub fn frame_create() -> FrameHandle {
    global().frame_create()
}

/// Acquires a frame populated from validated init data.
pub fn frame_create_ext(init: &FrameInit) -> FrameHandle {
    global().frame_create_ext(init)
}

/// Increments a frame's ref count; -1 for an unknown handle.
pub fn frame_addref(frame: FrameHandle) -> i32 {
    global().frame_addref(frame)
}

/// Decrements a frame's ref count; -1 for an unknown handle.
pub fn frame_release(frame: FrameHandle) -> i32 {
    global().frame_release(frame)
}

/// Payload size in bytes, or -1 for an unknown handle.
pub fn frame_getsize(frame: FrameHandle) -> i64 {
    global().frame_getsize(frame)
}

/// Runs `f` over the frame's payload bytes while the pool guarantees the
/// buffer stays put. `None` for an unknown handle.
pub fn with_frame_buffer<R>(frame: FrameHandle, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
    global().with_frame_buffer(frame, f)
}

/// Reads one header field; `None` for an unknown handle or unset field.
pub fn get_frame_headers(frame: FrameHandle, kind: HeaderKind) -> Option<i64> {
    global().get_frame_headers(frame, kind)
}

/// Stores one header field. Returns 0, or -1 with a log entry.
pub fn set_frame_headers(frame: FrameHandle, kind: HeaderKind, value: i64) -> i32 {
    global().set_frame_headers(frame, kind, value)
}

/// Reads a global parameter.
pub fn get_parameter(param: GlobalParam) -> i64 {
    global().get_parameter(param)
}

/// Writes a global parameter. Returns 0, or -1 with a log entry.
pub fn set_parameter(param: GlobalParam, value: i64) -> i32 {
    global().set_parameter(param, value)
}
