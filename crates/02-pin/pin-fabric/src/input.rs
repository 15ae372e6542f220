//! Input pins: a receive thread turning framing units into pooled frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, warn};

use frame_pool::{FrameHandle, FrameHeaders, FrameInit, FramePool, HeaderKind};

use crate::wire;
use crate::{
    FrameCallback, InputTransport, KvConfig, ModuleHandle, PinCommand, PinError, PinEvent,
    PinHandle, PinMetrics, PinMetricsSnapshot, PinResult, Polarity,
};

/// How long the receive thread parks in the transport per shutdown poll.
const RECV_POLL: Duration = Duration::from_millis(20);

/// Everything a receive thread needs beyond its transport.
#[derive(Clone)]
pub struct InputContext {
    /// Pool frames are acquired from.
    pub pool: Arc<FramePool>,
    /// Owning module, propagated into every event.
    pub module: ModuleHandle,
    /// Opaque user value, propagated into every event.
    pub user_data: usize,
    /// Callback receiving ticks and lifecycle events.
    pub callback: FrameCallback,
}

/// Receiving endpoint of a module.
///
/// Between `start` and `stop` the pin owns a dedicated thread that blocks on
/// its transport, builds a pooled frame per framing unit, and invokes the
/// user callback with [`PinCommand::Tick`]. The pin holds one reference for
/// the duration of the callback; callbacks that keep the handle must addref.
pub struct InputPin {
    handle: PinHandle,
    kind: String,
    config: KvConfig,
    metrics: Arc<PinMetrics>,
    shutdown: Arc<AtomicBool>,
    transport: Option<Box<dyn InputTransport>>,
    worker: Option<JoinHandle<Box<dyn InputTransport>>>,
}

impl InputPin {
    /// Wraps an opened transport into a stopped pin.
    pub fn new(
        handle: PinHandle,
        kind: String,
        config: KvConfig,
        transport: Box<dyn InputTransport>,
    ) -> Self {
        InputPin {
            handle,
            kind,
            config,
            metrics: Arc::new(PinMetrics::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
            transport: Some(transport),
            worker: None,
        }
    }

    /// Handle of this pin within its module.
    pub fn handle(&self) -> PinHandle {
        self.handle
    }

    /// Always [`Polarity::Input`].
    pub fn polarity(&self) -> Polarity {
        Polarity::Input
    }

    /// Transport kind this pin was built on.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Parameter group the pin was created from.
    pub fn config(&self) -> &KvConfig {
        &self.config
    }

    /// Point-in-time counters.
    pub fn metrics(&self) -> PinMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Spawns the receive thread. Starting a started pin is a no-op.
    pub fn start(&mut self, ctx: InputContext) -> PinResult<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        self.shutdown.store(false, Ordering::Relaxed);

        let handle = self.handle;
        let metrics = Arc::clone(&self.metrics);
        let shutdown = Arc::clone(&self.shutdown);
        let worker = thread::Builder::new()
            .name(format!("in-pin-{handle}"))
            .spawn(move || {
                receive_loop(transport.as_mut(), &ctx, handle, &metrics, &shutdown);
                transport
            })
            .map_err(PinError::Spawn)?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Signals the receive thread and joins it. Stopping a stopped pin is a
    /// no-op.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(transport) => self.transport = Some(transport),
                Err(_) => error!("input pin {} receive thread panicked", self.handle),
            }
        }
    }
}

impl Drop for InputPin {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    transport: &mut dyn InputTransport,
    ctx: &InputContext,
    pin: PinHandle,
    metrics: &PinMetrics,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match transport.recv(RECV_POLL) {
            Ok(None) => {}
            Ok(Some(unit)) => {
                metrics.record_received();
                match wire::decode(&unit) {
                    Ok(frame) => deliver(ctx, pin, metrics, frame),
                    Err(err) => {
                        metrics.record_dropped();
                        error!("input pin {pin}: dropping malformed unit: {err}");
                    }
                }
            }
            Err(err) => {
                error!("input pin {pin}: transport failed: {err}");
                (*ctx.callback)(PinEvent {
                    user_data: ctx.user_data,
                    module: ctx.module,
                    pin,
                    frame: FrameHandle::INVALID,
                    command: PinCommand::Quit,
                });
                break;
            }
        }
    }
}

fn deliver(ctx: &InputContext, pin: PinHandle, metrics: &PinMetrics, unit: wire::WireFrame) {
    let handle = match ctx.pool.acquire_with_init(&init_from_headers(&unit.headers)) {
        Ok(handle) => handle,
        Err(err) => {
            metrics.record_dropped();
            error!("input pin {pin}: dropping frame, pool refused it: {err}");
            return;
        }
    };

    let copied = ctx.pool.with_frame(handle, |frame| {
        let buffer = frame.buffer_mut();
        if buffer.len() != unit.payload.len() {
            warn!(
                "input pin {pin}: payload length {} disagrees with media size {}",
                unit.payload.len(),
                buffer.len()
            );
        }
        let len = buffer.len().min(unit.payload.len());
        buffer[..len].copy_from_slice(&unit.payload[..len]);
        for (tag, value) in unit.headers.extra_entries() {
            let _ = frame.set_header(HeaderKind::Other(tag), value);
        }
    });
    debug_assert!(copied.is_some(), "freshly acquired handle must resolve");

    metrics.record_delivered();
    // The pin's ref covers the callback; retaining callbacks addref.
    (*ctx.callback)(PinEvent {
        user_data: ctx.user_data,
        module: ctx.module,
        pin,
        frame: handle,
        command: PinCommand::Tick,
    });
    ctx.pool.release(handle);
}

fn init_from_headers(headers: &FrameHeaders) -> FrameInit {
    FrameInit {
        media_format: headers.media_format,
        media_size: Some(headers.media_size),
        width: (headers.width > 0).then_some(headers.width),
        height: (headers.height > 0).then_some(headers.height),
        depth: (headers.depth > 0).then_some(headers.depth),
        sampling: headers.sampling,
        timestamp: Some(headers.timestamp),
        frame_index: Some(headers.frame_index),
    }
}
