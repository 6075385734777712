//! IO task types and implementation for the tester link.
//!
//! One tokio task owns the transport exclusively. It feeds received lines,
//! operator requests, and connection changes into the [`Engine`] one at a
//! time and performs the writes and event emissions the engine asks for.
//! Nothing else touches the transport or the engine, so no locking is
//! needed.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use testerlink_core::error::{Error, Result};
use testerlink_core::events::LinkEvent;
use testerlink_core::transport::Transport;
use testerlink_core::types::READY_STRUCTURED;

use crate::engine::{Action, Engine, Input, Outbound};
use crate::firmware::FirmwareImage;
use crate::lines::{DEFAULT_MAX_LINE_LEN, LineAssembler};
use crate::scheduler::StreamStatus;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the link IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Largest number of bytes per transport write.
    pub chunk_size: usize,
    /// Line the controller sends when it will accept the next chunk.
    pub readiness: Bytes,
    /// Receive timeout per loop iteration.
    pub poll_interval: Duration,
    /// Bound on a partial inbound line.
    pub max_line_len: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            chunk_size: 256,
            readiness: Bytes::from_static(READY_STRUCTURED),
            poll_interval: Duration::from_millis(50),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// A request sent from the link handle to the IO task.
pub enum Request {
    /// Queue a command for flow-controlled dispatch.
    Command {
        cmd: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Announce and start streaming a firmware image.
    BeginFirmware {
        image: FirmwareImage,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Cancel the active firmware transfer.
    AbortFirmware { reply: oneshot::Sender<Result<()>> },
    /// Snapshot the scheduler.
    Status {
        reply: oneshot::Sender<StreamStatus>,
    },
    /// Graceful shutdown; returns the transport for recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Handle to the IO task.
pub struct LinkIo {
    /// Request channel into the IO loop.
    pub tx: mpsc::Sender<Request>,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
}

impl LinkIo {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::StreamClosed)?;
        reply_rx.await.map_err(|_| Error::StreamClosed)
    }

    /// Queue a command. Resolves once the command is buffered (and, if the
    /// link was idle, its first chunk written).
    pub async fn command(&self, cmd: impl Into<Bytes>) -> Result<()> {
        let cmd = cmd.into();
        self.request(|reply| Request::Command { cmd, reply }).await?
    }

    /// Start a firmware transfer. Resolves once the announcement is written.
    pub async fn begin_firmware(&self, image: FirmwareImage) -> Result<()> {
        self.request(|reply| Request::BeginFirmware { image, reply })
            .await?
    }

    /// Cancel the active firmware transfer, if any.
    pub async fn abort_firmware(&self) -> Result<()> {
        self.request(|reply| Request::AbortFirmware { reply }).await?
    }

    /// Snapshot the scheduler state.
    pub async fn status(&self) -> Result<StreamStatus> {
        self.request(|reply| Request::Status { reply }).await
    }

    /// Shut down the IO task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(Request::Shutdown { reply: reply_tx }).await;
        let transport = reply_rx.await.map_err(|_| Error::StreamClosed)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for sending requests.
///
/// The IO task owns the transport exclusively and handles command queueing,
/// readiness-gated chunk dispatch, firmware streaming, and inbound line
/// classification.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<LinkEvent>,
) -> LinkIo {
    let (tx, rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(transport, config, event_tx, rx, cancel_clone));

    LinkIo { tx, cancel, task }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// Receive buffer size per transport read.
const READ_BUF: usize = 512;

/// Pause after a receive error other than a timeout.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Operator requests
/// 3. Reading controller lines
///
/// The transport's connection state is sampled before every step so the
/// engine sees drops and reconnects in order with everything else.
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    event_tx: broadcast::Sender<LinkEvent>,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut engine = Engine::with_readiness(config.chunk_size, config.readiness.clone());
    let mut lines = LineAssembler::new(config.max_line_len);
    let mut buf = [0u8; READ_BUF];

    debug!(
        chunk_size = engine.chunk_size(),
        readiness = %String::from_utf8_lossy(engine.readiness()),
        "link IO task started"
    );

    loop {
        let connected = transport.is_connected();
        if connected != engine.is_connected() {
            if connected {
                lines.clear();
            }
            feed(&mut engine, Input::ConnectionChanged(connected), &mut *transport, &event_tx)
                .await;
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("link IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Shutdown { reply }) => {
                        debug!("link IO task shutdown requested");
                        let _ = reply.send(transport);
                        return;
                    }
                    Some(req) => handle_request(req, &mut engine, &mut *transport, &event_tx).await,
                    None => {
                        debug!("request channel closed, exiting link IO task");
                        break;
                    }
                }
            }

            res = transport.receive(&mut buf, config.poll_interval) => {
                match res {
                    Ok(n) if n > 0 => {
                        for line in lines.push(&buf[..n]) {
                            feed(&mut engine, Input::LineReceived(line), &mut *transport, &event_tx)
                                .await;
                        }
                    }
                    Ok(_) | Err(Error::Timeout) => {}
                    Err(e) if e.is_disconnect() => {
                        // Picked up by the connection sample on the next pass.
                        tokio::time::sleep(config.poll_interval).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "receive failed");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}

/// Execute a single request against the engine.
async fn handle_request(
    req: Request,
    engine: &mut Engine,
    transport: &mut dyn Transport,
    event_tx: &broadcast::Sender<LinkEvent>,
) {
    match req {
        Request::Command { cmd, reply } => {
            let result = run(engine, Input::NewCommand(cmd), transport, event_tx).await;
            let _ = reply.send(result);
        }
        Request::BeginFirmware { image, reply } => {
            let result = run(engine, Input::BeginFirmwareTransfer(image), transport, event_tx).await;
            let _ = reply.send(result);
        }
        Request::AbortFirmware { reply } => {
            let result = run(engine, Input::AbortFirmwareTransfer, transport, event_tx).await;
            let _ = reply.send(result);
        }
        Request::Status { reply } => {
            let _ = reply.send(engine.status());
        }
        Request::Shutdown { .. } => unreachable!("Shutdown handled in io_loop"),
    }
}

/// Feed an input whose refusal has nobody to report to.
async fn feed(
    engine: &mut Engine,
    input: Input,
    transport: &mut dyn Transport,
    event_tx: &broadcast::Sender<LinkEvent>,
) {
    if let Err(e) = run(engine, input, transport, event_tx).await {
        debug!(error = %e, "engine refused input");
    }
}

/// Hand one input to the engine and carry out the resulting actions in
/// order.
///
/// Writes are skipped while the engine considers the link down.
async fn run(
    engine: &mut Engine,
    input: Input,
    transport: &mut dyn Transport,
    event_tx: &broadcast::Sender<LinkEvent>,
) -> Result<()> {
    for action in engine.handle(input)? {
        match action {
            Action::Emit(event) => {
                let _ = event_tx.send(event);
            }
            Action::Write(out) => {
                if !engine.is_connected() {
                    tracing::trace!(kind = out.kind(), len = out.len(), "link down, write skipped");
                    continue;
                }
                write_chunk(transport, &out, event_tx).await;
            }
        }
    }
    Ok(())
}

/// Write one chunk.
///
/// Failures and short writes are reported as warnings and never retried; the
/// scheduler has already moved past these bytes. A failed send does not change
/// the connection state, which follows `Transport::is_connected` alone.
async fn write_chunk(
    transport: &mut dyn Transport,
    out: &Outbound,
    event_tx: &broadcast::Sender<LinkEvent>,
) {
    let len = out.len();
    match transport.send(out.bytes()).await {
        Ok(n) if n >= len => {
            tracing::trace!(kind = out.kind(), len, "chunk written");
        }
        Ok(n) => {
            tracing::warn!(kind = out.kind(), written = n, len, "short write");
            let _ = event_tx.send(LinkEvent::Warning(format!(
                "short write: {n} of {len} {} bytes",
                out.kind()
            )));
        }
        Err(e) => {
            tracing::warn!(kind = out.kind(), len, error = %e, "write failed");
            let _ = event_tx.send(LinkEvent::Warning(format!("write failed: {e}")));
        }
    }
}
