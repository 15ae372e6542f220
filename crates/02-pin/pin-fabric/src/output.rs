//! Output pins: a FIFO send queue drained by a transmit thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{error, warn};

use frame_pool::{FrameHandle, FramePool};

use crate::wire;
use crate::{
    BackpressurePolicy, KvConfig, OutputParam, OutputTransport, PinError, PinHandle, PinMetrics,
    PinMetricsSnapshot, PinResult, Polarity, TransportDescriptor,
};

enum Outbound {
    Frame(FrameHandle),
    Param(OutputParam, i64),
    Stop,
}

/// What happened to a frame handed to `send`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame entered the send queue.
    Accepted,
    /// The queue was full and the transport's policy discards the newest;
    /// the frame's send ref was released.
    Dropped,
}

/// Transmitting endpoint of a module.
///
/// `send` addrefs the frame, enqueues its handle, and returns; a dedicated
/// thread drains the queue in FIFO order, encodes under the pool lock,
/// transmits, and releases. Parameter updates travel the same queue so they
/// serialise with the frames around them.
pub struct OutputPin {
    handle: PinHandle,
    kind: String,
    config: KvConfig,
    descriptor: TransportDescriptor,
    pool: Arc<FramePool>,
    metrics: Arc<PinMetrics>,
    transport: Option<Box<dyn OutputTransport>>,
    tx: Option<Sender<Outbound>>,
    worker: Option<JoinHandle<Box<dyn OutputTransport>>>,
}

impl OutputPin {
    /// Wraps an opened transport into a stopped pin.
    pub fn new(
        handle: PinHandle,
        kind: String,
        config: KvConfig,
        transport: Box<dyn OutputTransport>,
        descriptor: TransportDescriptor,
        pool: Arc<FramePool>,
    ) -> Self {
        OutputPin {
            handle,
            kind,
            config,
            descriptor,
            pool,
            metrics: Arc::new(PinMetrics::default()),
            transport: Some(transport),
            tx: None,
            worker: None,
        }
    }

    /// Handle of this pin within its module.
    pub fn handle(&self) -> PinHandle {
        self.handle
    }

    /// Always [`Polarity::Output`].
    pub fn polarity(&self) -> Polarity {
        Polarity::Output
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

    /// Spawns the transmit thread. Starting a started pin is a no-op.
    pub fn start(&mut self) -> PinResult<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        let (tx, rx) = bounded(self.descriptor.queue_bound);

        let handle = self.handle;
        let pool = Arc::clone(&self.pool);
        let metrics = Arc::clone(&self.metrics);
        let worker = thread::Builder::new()
            .name(format!("out-pin-{handle}"))
            .spawn(move || {
                send_loop(transport.as_mut(), &rx, &pool, handle, &metrics);
                transport
            })
            .map_err(PinError::Spawn)?;

        self.tx = Some(tx);
        self.worker = Some(worker);
        Ok(())
    }

    /// Detached sending half, safe to use without holding the pin.
    pub fn sender(&self) -> Option<OutputSender> {
        self.tx.as_ref().map(|tx| OutputSender {
            pin: self.handle,
            tx: tx.clone(),
            pool: Arc::clone(&self.pool),
            metrics: Arc::clone(&self.metrics),
            backpressure: self.descriptor.backpressure,
        })
    }

    /// Enqueues `frame` for transmission; see [`OutputSender::send`].
    pub fn send(&self, frame: FrameHandle) -> PinResult<SendOutcome> {
        match self.sender() {
            Some(sender) => sender.send(frame),
            None => Err(PinError::NotStarted),
        }
    }

    /// Applies a parameter update, serialised with in-flight frames when the
    /// pin is running and applied directly when it is stopped.
    pub fn set_param(&mut self, param: OutputParam, value: i64) -> PinResult<()> {
        if let Some(tx) = &self.tx {
            tx.send(Outbound::Param(param, value))
                .map_err(|_| PinError::Stopped)?;
            return Ok(());
        }
        match self.transport.as_mut() {
            Some(transport) => {
                transport.set_param(param, value)?;
                Ok(())
            }
            None => Err(PinError::NotStarted),
        }
    }

    /// Flushes the queue and joins the transmit thread. Queued frames are
    /// transmitted before the thread exits; stopping a stopped pin is a
    /// no-op.
    pub fn stop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outbound::Stop);
        }
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(transport) => self.transport = Some(transport),
                Err(_) => error!("output pin {} transmit thread panicked", self.handle),
            }
        }
    }
}

impl Drop for OutputPin {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clonable sending half of an [`OutputPin`].
#[derive(Clone)]
pub struct OutputSender {
    pin: PinHandle,
    tx: Sender<Outbound>,
    pool: Arc<FramePool>,
    metrics: Arc<PinMetrics>,
    backpressure: BackpressurePolicy,
}

impl OutputSender {
    /// Addrefs `frame` and enqueues it for FIFO transmission.
    ///
    /// The added reference keeps the frame live until the transmit thread
    /// has sent it; the caller may release its own reference immediately
    /// after this returns. A full queue blocks or drops per the transport's
    /// backpressure policy.
    pub fn send(&self, frame: FrameHandle) -> PinResult<SendOutcome> {
        if self.pool.addref(frame) < 0 {
            return Err(PinError::UnknownFrame(frame));
        }

        let outcome = match self.backpressure {
            BackpressurePolicy::Block => self
                .tx
                .send(Outbound::Frame(frame))
                .map(|()| SendOutcome::Accepted)
                .map_err(|_| PinError::Stopped),
            BackpressurePolicy::DropNewest => match self.tx.try_send(Outbound::Frame(frame)) {
                Ok(()) => Ok(SendOutcome::Accepted),
                Err(TrySendError::Full(_)) => {
                    warn!("output pin {}: queue full, dropping frame {frame}", self.pin);
                    self.metrics.record_dropped();
                    self.pool.release(frame);
                    return Ok(SendOutcome::Dropped);
                }
                Err(TrySendError::Disconnected(_)) => Err(PinError::Stopped),
            },
        };

        match outcome {
            Ok(outcome) => {
                self.metrics.record_submitted();
                Ok(outcome)
            }
            Err(err) => {
                // The queue never took the frame; give the send ref back.
                self.pool.release(frame);
                Err(err)
            }
        }
    }
}

fn send_loop(
    transport: &mut dyn OutputTransport,
    rx: &Receiver<Outbound>,
    pool: &FramePool,
    pin: PinHandle,
    metrics: &PinMetrics,
) {
    for outbound in rx.iter() {
        match outbound {
            Outbound::Stop => break,
            Outbound::Param(param, value) => {
                if let Err(err) = transport.set_param(param, value) {
                    error!("output pin {pin}: parameter update failed: {err}");
                }
            }
            Outbound::Frame(frame) => {
                transmit(transport, pool, pin, metrics, frame);
                pool.release(frame);
            }
        }
    }

    // Frames that raced past the stop sentinel still hold a send ref.
    while let Ok(outbound) = rx.try_recv() {
        if let Outbound::Frame(frame) = outbound {
            metrics.record_dropped();
            pool.release(frame);
        }
    }
}

fn transmit(
    transport: &mut dyn OutputTransport,
    pool: &FramePool,
    pin: PinHandle,
    metrics: &PinMetrics,
    frame: FrameHandle,
) {
    let encoded = pool.with_frame(frame, |frame| wire::encode(frame.headers(), frame.buffer()));
    match encoded {
        Some(unit) => match transport.send(&unit) {
            Ok(()) => metrics.record_sent(),
            Err(err) => {
                metrics.record_dropped();
                error!("output pin {pin}: transmit failed: {err}");
            }
        },
        None => {
            metrics.record_dropped();
            error!("output pin {pin}: frame {frame} vanished before transmit");
        }
    }
}
