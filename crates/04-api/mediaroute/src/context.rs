//! Explicit context object owning the pool, registry, and transports.

use std::sync::Arc;

use log::error;

use frame_pool::{FrameHandle, FrameInit, FramePool, HeaderKind};
use module_hub::{Module, ModuleRegistry, ModuleStatus};
use pin_fabric::{FrameCallback, ModuleHandle, OutputParam, PinHandle, TransportRegistry};

/// Process-level tunables addressed by tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalParam {
    /// Slot cap of the frame pool. Read-write.
    MaxFramesInList,
    /// Slots currently in the frame list. Read-only.
    CurFramesInList,
}

/// Everything one routing instance owns: the frame pool, the module
/// registry, and the transport set.
///
/// The external semantics match the process-wide singleton exactly; the
/// explicit object exists so embedders and tests can run isolated
/// instances side by side.
pub struct Context {
    pool: Arc<FramePool>,
    modules: ModuleRegistry,
    transports: Arc<TransportRegistry>,
}

impl Context {
    /// A context with the default pool cap and built-in transports.
    pub fn new() -> Self {
        Context {
            pool: Arc::new(FramePool::new()),
            modules: ModuleRegistry::new(),
            transports: Arc::new(TransportRegistry::with_builtin()),
        }
    }

    /// A context whose frame pool is capped at `cap` slots.
    pub fn with_pool_cap(cap: usize) -> Self {
        Context {
            pool: Arc::new(FramePool::with_cap(cap)),
            modules: ModuleRegistry::new(),
            transports: Arc::new(TransportRegistry::with_builtin()),
        }
    }

    /// Shared frame pool of this context.
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.pool
    }

    /// Creates a module from a flat config string.
    ///
    /// Builds one pin per declared group, binds the control channel on
    /// `port` (0 disables it), and registers the module. Returns the
    /// invalid handle, with a log entry, when any step fails.
    pub fn create_module(
        &self,
        port: u16,
        callback: FrameCallback,
        config: &str,
        user_data: usize,
    ) -> ModuleHandle {
        self.create_with(port, callback, config, user_data, &self.transports)
    }

    /// [`Context::create_module`] with a caller-supplied transport registry,
    /// for hosts that bring their own carriers.
    pub fn create_module_ext(
        &self,
        port: u16,
        callback: FrameCallback,
        config: &str,
        user_data: usize,
        transports: &TransportRegistry,
    ) -> ModuleHandle {
        self.create_with(port, callback, config, user_data, transports)
    }

    fn create_with(
        &self,
        port: u16,
        callback: FrameCallback,
        config: &str,
        user_data: usize,
        transports: &TransportRegistry,
    ) -> ModuleHandle {
        let pool = Arc::clone(&self.pool);
        let built = self.modules.insert(|handle| {
            Module::create(handle, port, callback, config, user_data, pool, transports)
        });
        match built {
            Ok(handle) => handle,
            Err(err) => {
                error!("create_module failed: {err}");
                ModuleHandle::INVALID
            }
        }
    }

    /// Starts a module's pins and control task, delivering the start event
    /// before returning. Returns 0, or -1 with a log entry.
    pub fn start_module(&self, module: ModuleHandle) -> i32 {
        self.with_module(module, "start_module", |module| module.start())
    }

    /// Stops a module's pins and flushes its queues. Idempotent. Returns 0,
    /// or -1 with a log entry.
    pub fn stop_module(&self, module: ModuleHandle) -> i32 {
        self.with_module(module, "stop_module", |module| module.stop())
    }

    /// Stops if needed, tears the module down, and tombstones its registry
    /// slot. Returns 0, or -1 with a log entry.
    pub fn close(&self, module: ModuleHandle) -> i32 {
        match self.modules.close(module) {
            Ok(()) => 0,
            Err(err) => {
                error!("close failed: {err}");
                -1
            }
        }
    }

    /// Number of input pins, or -1 for an unknown module.
    pub fn get_input_count(&self, module: ModuleHandle) -> i32 {
        match self.modules.get(module) {
            Some(module) => module.input_count() as i32,
            None => {
                error!("get_input_count: unknown module handle {module}");
                -1
            }
        }
    }

    /// Number of output pins, or -1 for an unknown module.
    pub fn get_output_count(&self, module: ModuleHandle) -> i32 {
        match self.modules.get(module) {
            Some(module) => module.output_count() as i32,
            None => {
                error!("get_output_count: unknown module handle {module}");
                -1
            }
        }
    }

    /// Handle of the `index`-th input pin, or the invalid handle with a log
    /// entry.
    pub fn get_input_handle(&self, module: ModuleHandle, index: usize) -> PinHandle {
        let Some(module) = self.modules.get(module) else {
            error!("get_input_handle: unknown module handle {module}");
            return PinHandle::INVALID;
        };
        module.input_handle(index).unwrap_or(PinHandle::INVALID)
    }

    /// Handle of the `index`-th output pin, or the invalid handle with a
    /// log entry.
    pub fn get_output_handle(&self, module: ModuleHandle, index: usize) -> PinHandle {
        let Some(module) = self.modules.get(module) else {
            error!("get_output_handle: unknown module handle {module}");
            return PinHandle::INVALID;
        };
        module.output_handle(index).unwrap_or(PinHandle::INVALID)
    }

    /// Applies a parameter update to an output pin. Returns 0, or -1 with a
    /// log entry.
    pub fn set_output_parameter(
        &self,
        module: ModuleHandle,
        output: PinHandle,
        param: OutputParam,
        value: i64,
    ) -> i32 {
        self.with_module(module, "set_output_parameter", |module| {
            module.set_output_param(output, param, value)
        })
    }

    /// Enqueues `frame` on an output pin.
    ///
    /// An unknown output pin is a logged no-op that still returns 0 —
    /// callers have historically depended on that. An unknown frame handle
    /// returns -1.
    pub fn send(&self, module: ModuleHandle, output: PinHandle, frame: FrameHandle) -> i32 {
        self.with_module(module, "send", |module| module.send(output, frame))
    }

    /// Status snapshot of a module, as served to the control channel.
    pub fn module_status(&self, module: ModuleHandle) -> Option<ModuleStatus> {
        self.modules.get(module).map(|module| module.status())
    }

    /// Acquires an empty frame; the invalid handle on failure (logged).
    pub fn frame_create(&self) -> FrameHandle {
        self.pool.acquire().unwrap_or(FrameHandle::INVALID)
    }

    /// Acquires a frame populated from `init`; the invalid handle on
    /// validation failure or exhaustion (logged).
    pub fn frame_create_ext(&self, init: &FrameInit) -> FrameHandle {
        self.pool
            .acquire_with_init(init)
            .unwrap_or(FrameHandle::INVALID)
    }

    /// Increments a frame's ref count; -1 for an unknown handle.
    pub fn frame_addref(&self, frame: FrameHandle) -> i32 {
        self.pool.addref(frame)
    }

    /// Decrements a frame's ref count; -1 for an unknown handle.
    pub fn frame_release(&self, frame: FrameHandle) -> i32 {
        self.pool.release(frame)
    }

    /// Payload size in bytes, or -1 for an unknown handle.
    pub fn frame_getsize(&self, frame: FrameHandle) -> i64 {
        match self.pool.media_size(frame) {
            Some(size) => size as i64,
            None => {
                error!("frame_getsize: unknown frame handle {frame}");
                -1
            }
        }
    }

    /// Runs `f` over the frame's payload bytes. The buffer cannot move or
    /// be reclaimed while the caller holds a reference; access happens
    /// under the pool's slot lock, so keep `f` to buffer work only.
    pub fn with_frame_buffer<R>(
        &self,
        frame: FrameHandle,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Option<R> {
        self.pool.with_frame(frame, |frame| f(frame.buffer_mut()))
    }

    /// Reads one header field; `None` for an unknown handle or unset field.
    pub fn get_frame_headers(&self, frame: FrameHandle, kind: HeaderKind) -> Option<i64> {
        self.pool.header(frame, kind)
    }

    /// Stores one header field. Returns 0, or -1 with a log entry.
    pub fn set_frame_headers(&self, frame: FrameHandle, kind: HeaderKind, value: i64) -> i32 {
        match self.pool.set_header(frame, kind, value) {
            Ok(()) => 0,
            Err(err) => {
                error!("set_frame_headers failed: {err}");
                -1
            }
        }
    }

    /// Reads a global parameter.
    pub fn get_parameter(&self, param: GlobalParam) -> i64 {
        match param {
            GlobalParam::MaxFramesInList => self.pool.cap() as i64,
            GlobalParam::CurFramesInList => self.pool.slot_count() as i64,
        }
    }

    /// Writes a global parameter. Read-only parameters and negative values
    /// are rejected with -1 and a log entry.
    pub fn set_parameter(&self, param: GlobalParam, value: i64) -> i32 {
        match param {
            GlobalParam::MaxFramesInList if value >= 0 => {
                self.pool.set_cap(value as usize);
                0
            }
            GlobalParam::MaxFramesInList => {
                error!("set_parameter: negative cap {value} rejected");
                -1
            }
            GlobalParam::CurFramesInList => {
                error!("set_parameter: CUR_FRAMES_IN_LIST is read-only");
                -1
            }
        }
    }

    fn with_module(
        &self,
        module: ModuleHandle,
        what: &str,
        f: impl FnOnce(&Arc<Module>) -> module_hub::ModuleResult<()>,
    ) -> i32 {
        let Some(module) = self.modules.get(module) else {
            error!("{what}: unknown module handle {module}");
            return -1;
        };
        match f(&module) {
            Ok(()) => 0,
            Err(err) => {
                error!("{what} failed: {err}");
                -1
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
