//! Out-of-band TCP control channel.
//!
//! Each module binds one listener on its configured port. A single accept
//! thread serves one connection, one request at a time: an ASCII command
//! line in, a short reply line out. Commands mutate module state only
//! through the handler the controller installs, so the data path never
//! contends with control traffic.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context as _, Result};
use log::{error, warn};

use crate::{ModuleError, ModuleResult};

/// How long the accept thread sleeps between polls of an idle listener.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// How long a connected peer may sit silent before the channel drops it.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Command parsed from one control request line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start the module.
    Start,
    /// Stop the module.
    Stop,
    /// Report module status.
    Status,
    /// Anything else; answered with an error reply.
    Other(String),
}

impl ControlCommand {
    fn parse(line: &str) -> Self {
        match line {
            "START" => ControlCommand::Start,
            "STOP" => ControlCommand::Stop,
            "STATUS" => ControlCommand::Status,
            other => ControlCommand::Other(other.to_owned()),
        }
    }
}

/// Executes one control command and produces the reply line.
pub type ControlHandler = Arc<dyn Fn(ControlCommand) -> String + Send + Sync>;

/// Bound control socket plus its accept thread.
///
/// The listener binds at construction so configuration errors surface
/// during module init; the accept thread spawns on [`ControlChannel::start`]
/// and runs until [`ControlChannel::stop`].
pub struct ControlChannel {
    port: u16,
    handler: ControlHandler,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ControlChannel {
    /// Binds the control socket on `port`. Port 0 binds an ephemeral port;
    /// use [`ControlChannel::port`] to discover it.
    pub fn bind(port: u16, handler: ControlHandler) -> ModuleResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .map_err(|source| ModuleError::ControlBind { port, source })?;
        let bound = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(port);
        Ok(ControlChannel {
            port: bound,
            handler,
            listener: Some(listener),
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    /// Port the channel actually listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Spawns the accept thread. Starting a started channel is a no-op.
    pub fn start(&mut self) -> ModuleResult<()> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        if let Err(err) = listener.set_nonblocking(true) {
            self.listener = Some(listener);
            return Err(ModuleError::ControlBind {
                port: self.port,
                source: err,
            });
        }
        self.shutdown.store(false, Ordering::Relaxed);

        let handler = Arc::clone(&self.handler);
        let shutdown = Arc::clone(&self.shutdown);
        let port = self.port;
        let worker = thread::Builder::new()
            .name(format!("ctrl-{port}"))
            .spawn(move || accept_loop(&listener, &handler, &shutdown, port))
            .map_err(|source| ModuleError::ControlBind { port, source })?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Signals the accept thread and joins it.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("control channel on port {} panicked", self.port);
            }
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: &TcpListener,
    handler: &ControlHandler,
    shutdown: &AtomicBool,
    port: u16,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = serve_connection(stream, handler) {
                    warn!("control connection from {peer} failed: {err:#}");
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                error!("control channel on port {port} stopped accepting: {err}");
                break;
            }
        }
    }
}

fn serve_connection(stream: TcpStream, handler: &ControlHandler) -> Result<()> {
    // The listener is nonblocking; the accepted stream must not be.
    stream
        .set_nonblocking(false)
        .context("clear nonblocking on control stream")?;
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .context("set control read timeout")?;

    let mut writer = stream.try_clone().context("clone control stream")?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).context("read control request")?;
        if read == 0 {
            return Ok(());
        }
        let reply = (**handler)(ControlCommand::parse(line.trim()));
        writer
            .write_all(reply.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .context("write control reply")?;
    }
}
