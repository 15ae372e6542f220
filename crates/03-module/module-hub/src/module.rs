//! One running processing unit: pins, callback, control channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{error, warn};
use parking_lot::Mutex;
use serde::Serialize;

use frame_pool::{FrameHandle, FramePool};
use pin_fabric::{
    FrameCallback, InputContext, InputPin, KvConfig, ModuleHandle, OutputParam, OutputPin,
    OutputSender, PinCommand, PinError, PinEvent, PinHandle, TransportRegistry,
};

use crate::control::{ControlChannel, ControlCommand, ControlHandler};
use crate::{split_pin_groups, ModuleError, ModuleResult, ModuleStatus, PinStatus};

/// Lifecycle state of a module. Close is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ModuleState {
    /// Built, pins not yet finalised.
    Created,
    /// Pins and control channel in place.
    Initialised,
    /// Pins and control task running.
    Started,
    /// Pins quiesced; the control channel stays reachable.
    Stopped,
    /// Torn down and removed from the registry.
    Closed,
}

struct ModuleBody {
    state: ModuleState,
    inputs: Vec<InputPin>,
    outputs: Vec<OutputPin>,
    control: Option<ControlChannel>,
}

/// A module: ordered input/output pins, a user callback, and an out-of-band
/// control channel, all addressed through one registry handle.
///
/// Lock shape: `body` guards lifecycle transitions and pin ownership and is
/// held while pin threads are joined, so nothing a callback may legally do
/// takes it — pin-handle accessors read the immutable index and `send` goes
/// through the separate senders table.
pub struct Module {
    handle: ModuleHandle,
    user_data: usize,
    callback: FrameCallback,
    pool: Arc<FramePool>,
    config: KvConfig,
    input_handles: Vec<PinHandle>,
    output_handles: Vec<PinHandle>,
    senders: Mutex<HashMap<PinHandle, OutputSender>>,
    body: Mutex<ModuleBody>,
    in_callback: AtomicBool,
}

impl Module {
    /// Parses `config`, builds one pin per declared group, binds the control
    /// channel, and returns the initialised module.
    ///
    /// `port` 0 disables the control channel. Pin handles are assigned
    /// monotonically in declaration order, inputs first.
    pub fn create(
        handle: ModuleHandle,
        port: u16,
        callback: FrameCallback,
        config: &str,
        user_data: usize,
        pool: Arc<FramePool>,
        transports: &TransportRegistry,
    ) -> ModuleResult<Arc<Module>> {
        let groups = split_pin_groups(config);
        let mut next_pin = 0_i32;
        let mut next_pin_handle = || {
            let pin = PinHandle::from_raw(next_pin);
            next_pin += 1;
            pin
        };

        let mut inputs = Vec::with_capacity(groups.inputs.len());
        for group in &groups.inputs {
            let cfg = KvConfig::parse(group);
            let kind = cfg.get("in_type").unwrap_or_default().to_owned();
            let (transport, _) = transports.open_input(&kind, &cfg)?;
            inputs.push(InputPin::new(next_pin_handle(), kind, cfg, transport));
        }
        let mut outputs = Vec::with_capacity(groups.outputs.len());
        for group in &groups.outputs {
            let cfg = KvConfig::parse(group);
            let kind = cfg.get("out_type").unwrap_or_default().to_owned();
            let (transport, descriptor) = transports.open_output(&kind, &cfg)?;
            outputs.push(OutputPin::new(
                next_pin_handle(),
                kind,
                cfg,
                transport,
                descriptor,
                Arc::clone(&pool),
            ));
        }

        let module = Arc::new(Module {
            handle,
            user_data,
            callback,
            pool,
            config: KvConfig::parse(&groups.module),
            input_handles: inputs.iter().map(InputPin::handle).collect(),
            output_handles: outputs.iter().map(OutputPin::handle).collect(),
            senders: Mutex::new(HashMap::new()),
            body: Mutex::new(ModuleBody {
                state: ModuleState::Created,
                inputs,
                outputs,
                control: None,
            }),
            in_callback: AtomicBool::new(false),
        });
        module.init(port)?;
        Ok(module)
    }

    /// Binds the control channel and finalises pin parameters.
    fn init(self: &Arc<Self>, port: u16) -> ModuleResult<()> {
        let mut body = self.body.lock();
        if port != 0 {
            let weak = Arc::downgrade(self);
            body.control = Some(ControlChannel::bind(port, control_handler(weak))?);
        }
        body.state = ModuleState::Initialised;
        Ok(())
    }

    /// Registry handle of this module.
    pub fn handle(&self) -> ModuleHandle {
        self.handle
    }

    /// Module-level parameters (tokens before the first pin delimiter).
    pub fn config(&self) -> &KvConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModuleState {
        self.body.lock().state
    }

    /// Port the control channel listens on; `None` when disabled.
    pub fn control_port(&self) -> Option<u16> {
        self.body.lock().control.as_ref().map(ControlChannel::port)
    }

    /// Starts all pins and the control task, then delivers
    /// [`PinCommand::Start`] synchronously before returning.
    ///
    /// Must not be invoked from inside the module callback. Starting a
    /// started module is a no-op.
    pub fn start(self: &Arc<Self>) -> ModuleResult<()> {
        self.guard_reentrancy()?;
        {
            let mut body = self.body.lock();
            match body.state {
                ModuleState::Closed => return Err(ModuleError::Closed),
                ModuleState::Started => return Ok(()),
                _ => {}
            }

            if let Err(err) = self.start_pins(&mut body) {
                // Half-started pins would leak threads; wind them back down.
                for input in body.inputs.iter_mut() {
                    input.stop();
                }
                for output in body.outputs.iter_mut() {
                    output.stop();
                }
                self.senders.lock().clear();
                return Err(err);
            }
            body.state = ModuleState::Started;
        }
        self.fire_lifecycle(PinCommand::Start);
        Ok(())
    }

    /// Stops pins and quiesces queues, then delivers [`PinCommand::Stop`]
    /// synchronously. Idempotent; the control channel stays reachable so a
    /// stopped module can be restarted out-of-band.
    pub fn stop(self: &Arc<Self>) -> ModuleResult<()> {
        self.guard_reentrancy()?;
        {
            let mut body = self.body.lock();
            if body.state != ModuleState::Started {
                return Ok(());
            }
            // Inputs first: callbacks may still be sending, and their
            // frames land in output queues that flush next.
            for input in body.inputs.iter_mut() {
                input.stop();
            }
            for output in body.outputs.iter_mut() {
                output.stop();
            }
            self.senders.lock().clear();
            body.state = ModuleState::Stopped;
        }
        self.fire_lifecycle(PinCommand::Stop);
        Ok(())
    }

    /// Stops if running, tears down pins and the control channel. Terminal.
    pub fn close(self: &Arc<Self>) -> ModuleResult<()> {
        self.guard_reentrancy()?;
        self.stop()?;
        // The control accept thread may be blocked on the body lock inside
        // a command handler; join it only after the lock is released.
        let control = {
            let mut body = self.body.lock();
            if body.state == ModuleState::Closed {
                return Ok(());
            }
            body.state = ModuleState::Closed;
            body.inputs.clear();
            body.outputs.clear();
            body.control.take()
        };
        if let Some(mut control) = control {
            control.stop();
        }
        Ok(())
    }

    /// Number of input pins.
    pub fn input_count(&self) -> usize {
        self.input_handles.len()
    }

    /// Number of output pins.
    pub fn output_count(&self) -> usize {
        self.output_handles.len()
    }

    /// Handle of the `index`-th input pin, in declaration order.
    pub fn input_handle(&self, index: usize) -> ModuleResult<PinHandle> {
        self.input_handles
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range(self.handle, index, self.input_handles.len()))
    }

    /// Handle of the `index`-th output pin, in declaration order.
    pub fn output_handle(&self, index: usize) -> ModuleResult<PinHandle> {
        self.output_handles
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range(self.handle, index, self.output_handles.len()))
    }

    /// Enqueues `frame` on the output pin named by `output`.
    ///
    /// An unknown output pin is logged and reported as success — callers
    /// have historically depended on the no-op. An unknown frame handle is
    /// a failure. Safe to call from a tick callback.
    pub fn send(&self, output: PinHandle, frame: FrameHandle) -> ModuleResult<()> {
        if !self.output_handles.contains(&output) {
            warn!(
                "module {}: send to unknown output pin {output}, ignoring",
                self.handle
            );
            return Ok(());
        }
        let sender = self
            .senders
            .lock()
            .get(&output)
            .cloned()
            .ok_or(PinError::NotStarted)?;

        sender.send(frame).map_err(|err| match err {
            PinError::UnknownFrame(frame) => ModuleError::UnknownFrame(frame),
            other => ModuleError::Pin(other),
        })?;
        Ok(())
    }

    /// Applies a parameter update to one output pin.
    pub fn set_output_param(
        &self,
        output: PinHandle,
        param: OutputParam,
        value: i64,
    ) -> ModuleResult<()> {
        let mut body = self.body.lock();
        let pin = body
            .outputs
            .iter_mut()
            .find(|pin| pin.handle() == output)
            .ok_or(ModuleError::UnknownPin(output))?;
        pin.set_param(param, value)?;
        Ok(())
    }

    /// Snapshot served to the `STATUS` control command.
    pub fn status(&self) -> ModuleStatus {
        let body = self.body.lock();
        let pin_status = |handle: PinHandle, polarity, kind: &str, metrics| PinStatus {
            handle: handle.raw(),
            polarity,
            kind: kind.to_owned(),
            metrics,
        };
        ModuleStatus {
            module: self.handle.raw(),
            state: body.state,
            inputs: body
                .inputs
                .iter()
                .map(|pin| pin_status(pin.handle(), pin.polarity(), pin.kind(), pin.metrics()))
                .collect(),
            outputs: body
                .outputs
                .iter()
                .map(|pin| pin_status(pin.handle(), pin.polarity(), pin.kind(), pin.metrics()))
                .collect(),
            frames_in_list: self.pool.slot_count(),
        }
    }

    /// Outputs start first so a callback fired by an early input can send
    /// immediately; the control task starts last.
    fn start_pins(self: &Arc<Self>, body: &mut ModuleBody) -> ModuleResult<()> {
        let mut senders = HashMap::with_capacity(body.outputs.len());
        for output in body.outputs.iter_mut() {
            output.start()?;
            if let Some(sender) = output.sender() {
                senders.insert(output.handle(), sender);
            }
        }
        *self.senders.lock() = senders;

        let ctx = InputContext {
            pool: Arc::clone(&self.pool),
            module: self.handle,
            user_data: self.user_data,
            callback: self.wrapped_callback(),
        };
        for input in body.inputs.iter_mut() {
            input.start(ctx.clone())?;
        }
        if let Some(control) = body.control.as_mut() {
            control.start()?;
        }
        Ok(())
    }

    fn guard_reentrancy(&self) -> ModuleResult<()> {
        if self.in_callback.load(Ordering::Relaxed) {
            error!(
                "module {}: lifecycle call from inside the callback rejected",
                self.handle
            );
            return Err(ModuleError::ReentrantCall);
        }
        Ok(())
    }

    /// Wraps the user callback so the in-callback flag covers every
    /// invocation, including ticks on pin receive threads.
    fn wrapped_callback(self: &Arc<Self>) -> FrameCallback {
        let weak = Arc::downgrade(self);
        let user = Arc::clone(&self.callback);
        Arc::new(move |event: PinEvent| {
            if let Some(module) = weak.upgrade() {
                module.in_callback.store(true, Ordering::Relaxed);
                (*user)(event);
                module.in_callback.store(false, Ordering::Relaxed);
            } else {
                (*user)(event);
            }
        })
    }

    fn fire_lifecycle(self: &Arc<Self>, command: PinCommand) {
        let callback = self.wrapped_callback();
        (*callback)(PinEvent {
            user_data: self.user_data,
            module: self.handle,
            pin: PinHandle::INVALID,
            frame: FrameHandle::INVALID,
            command,
        });
    }
}

fn out_of_range(module: ModuleHandle, index: usize, count: usize) -> ModuleError {
    error!("module {module}: pin index {index} out of range ({count} pins)");
    ModuleError::OutOfRange { index, count }
}

fn control_handler(weak: Weak<Module>) -> ControlHandler {
    Arc::new(move |command| {
        let Some(module) = weak.upgrade() else {
            return "ERR module closed".to_owned();
        };
        match command {
            ControlCommand::Start => reply_from(module.start()),
            ControlCommand::Stop => reply_from(module.stop()),
            ControlCommand::Status => match serde_json::to_string(&module.status()) {
                Ok(status) => status,
                Err(err) => format!("ERR {err}"),
            },
            ControlCommand::Other(command) => {
                warn!(
                    "module {}: unknown control command '{command}'",
                    module.handle
                );
                "ERR unknown command".to_owned()
            }
        }
    })
}

fn reply_from(result: ModuleResult<()>) -> String {
    match result {
        Ok(()) => "OK".to_owned(),
        Err(err) => format!("ERR {err}"),
    }
}
