//! In-process loopback transport over named bounded channels.
//!
//! One factory instance owns a namespace of channels; an output pin opened
//! on `out_queue=name` feeds every input pin opened on `in_queue=name`
//! within the same factory (and therefore the same process context). Units
//! travel encoded so the loopback exercises the same framing as byte
//! carriers.

use std::collections::HashMap;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::{
    BackpressurePolicy, InputTransport, KvConfig, OutputTransport, TransportDescriptor,
    TransportError, TransportFactory, TransportResult,
};

/// The `type` config value answered by the loopback transport.
pub const QUEUE_KIND: &str = "queue";

/// Units buffered per named channel before senders block.
const QUEUE_DEPTH: usize = 64;

struct NamedChannel {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Factory for the in-process `queue` transport.
pub struct QueueTransportFactory {
    channels: Mutex<HashMap<String, NamedChannel>>,
}

impl QueueTransportFactory {
    /// Creates a factory with an empty channel namespace.
    pub fn new() -> Self {
        QueueTransportFactory {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channel(&self, name: &str) -> NamedChannel {
        let mut channels = self.channels.lock();
        let entry = channels.entry(name.to_owned()).or_insert_with(|| {
            let (tx, rx) = bounded(QUEUE_DEPTH);
            NamedChannel { tx, rx }
        });
        NamedChannel {
            tx: entry.tx.clone(),
            rx: entry.rx.clone(),
        }
    }
}

impl Default for QueueTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for QueueTransportFactory {
    fn descriptor(&self) -> TransportDescriptor {
        TransportDescriptor {
            kind: QUEUE_KIND,
            queue_bound: QUEUE_DEPTH,
            backpressure: BackpressurePolicy::Block,
        }
    }

    fn open_input(&self, config: &KvConfig) -> TransportResult<Box<dyn InputTransport>> {
        let name = config.get("in_queue").ok_or_else(|| {
            TransportError::InvalidConfig("queue input needs an in_queue name".into())
        })?;
        Ok(Box::new(QueueInput {
            rx: self.channel(name).rx,
        }))
    }

    fn open_output(&self, config: &KvConfig) -> TransportResult<Box<dyn OutputTransport>> {
        let name = config.get("out_queue").ok_or_else(|| {
            TransportError::InvalidConfig("queue output needs an out_queue name".into())
        })?;
        Ok(Box::new(QueueOutput {
            tx: self.channel(name).tx,
        }))
    }
}

struct QueueInput {
    rx: Receiver<Vec<u8>>,
}

impl InputTransport for QueueInput {
    fn recv(&mut self, wait: Duration) -> TransportResult<Option<Vec<u8>>> {
        match self.rx.recv_timeout(wait) {
            Ok(unit) => Ok(Some(unit)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

struct QueueOutput {
    tx: Sender<Vec<u8>>,
}

impl OutputTransport for QueueOutput {
    fn send(&mut self, encoded: &[u8]) -> TransportResult<()> {
        self.tx
            .send(encoded.to_vec())
            .map_err(|_| TransportError::Closed)
    }
}
