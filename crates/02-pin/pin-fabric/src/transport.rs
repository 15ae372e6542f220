//! Transport traits, descriptors, and the kind registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{KvConfig, TransportError, TransportResult};

/// Tunable knob on an output transport.
///
/// The space is open like the header tags: kinds the core does not know ride
/// through [`OutputParam::Other`] and are interpreted by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputParam {
    /// Target bitrate in bits per second.
    Bitrate,
    /// Destination port for datagram carriers.
    DestPort,
    /// Program identifier for mux-aware carriers.
    Pid,
    /// Time-to-live for multicast carriers.
    Ttl,
    /// Transport-defined parameter tag.
    Other(u32),
}

/// What an output pin does when its send queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// `send` blocks until the queue drains.
    Block,
    /// `send` drops the new frame, releases its ref, and reports the drop.
    DropNewest,
}

/// Fixed facts about a transport kind, published by its factory.
#[derive(Clone, Copy, Debug)]
pub struct TransportDescriptor {
    /// The `type` config value this transport answers to.
    pub kind: &'static str,
    /// Bound of the output pin's send queue.
    pub queue_bound: usize,
    /// Policy applied when that queue is full.
    pub backpressure: BackpressurePolicy,
}

/// Receiving side of a carrier, polled by an input pin's receive thread.
pub trait InputTransport: Send {
    /// Waits up to `wait` for the next framing unit.
    ///
    /// `Ok(None)` means the wait elapsed without data — the caller polls its
    /// shutdown flag and tries again. Errors are unrecoverable for this pin.
    fn recv(&mut self, wait: Duration) -> TransportResult<Option<Vec<u8>>>;
}

/// Transmitting side of a carrier, driven by an output pin's send thread.
pub trait OutputTransport: Send {
    /// Transmits one encoded framing unit.
    fn send(&mut self, encoded: &[u8]) -> TransportResult<()>;

    /// Applies a parameter update. Transports ignore kinds they do not
    /// understand.
    fn set_param(&mut self, param: OutputParam, value: i64) -> TransportResult<()> {
        let _ = (param, value);
        Ok(())
    }
}

/// Builds transports of one kind from pin configuration.
pub trait TransportFactory: Send + Sync {
    /// Fixed facts about this transport kind.
    fn descriptor(&self) -> TransportDescriptor;

    /// Opens the receiving side for an input pin.
    fn open_input(&self, config: &KvConfig) -> TransportResult<Box<dyn InputTransport>>;

    /// Opens the transmitting side for an output pin.
    fn open_output(&self, config: &KvConfig) -> TransportResult<Box<dyn OutputTransport>>;
}

/// Maps `type` config values to transport factories.
///
/// The registry owns no policy of its own: the exact transport set is a
/// deployment concern. [`TransportRegistry::with_builtin`] seeds the
/// in-process `queue` transport that ships with the core.
pub struct TransportRegistry {
    factories: HashMap<String, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    /// A registry with no transports at all.
    pub fn empty() -> Self {
        TransportRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry seeded with the built-in `queue` transport.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(crate::QueueTransportFactory::new()));
        registry
    }

    /// Registers `factory` under its descriptor kind, replacing any earlier
    /// registration for the same kind.
    pub fn register(&mut self, factory: Arc<dyn TransportFactory>) {
        self.factories
            .insert(factory.descriptor().kind.to_owned(), factory);
    }

    /// Resolves a kind to its factory.
    pub fn factory(&self, kind: &str) -> TransportResult<&Arc<dyn TransportFactory>> {
        self.factories
            .get(kind)
            .ok_or_else(|| TransportError::UnknownKind(kind.to_owned()))
    }

    /// Opens an input transport of `kind` with its descriptor.
    pub fn open_input(
        &self,
        kind: &str,
        config: &KvConfig,
    ) -> TransportResult<(Box<dyn InputTransport>, TransportDescriptor)> {
        let factory = self.factory(kind)?;
        Ok((factory.open_input(config)?, factory.descriptor()))
    }

    /// Opens an output transport of `kind` with its descriptor.
    pub fn open_output(
        &self,
        kind: &str,
        config: &KvConfig,
    ) -> TransportResult<(Box<dyn OutputTransport>, TransportDescriptor)> {
        let factory = self.factory(kind)?;
        Ok((factory.open_output(config)?, factory.descriptor()))
    }

    /// Registered kinds, for diagnostics.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }
}
