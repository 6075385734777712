//! Outbound stream scheduler.
//!
//! The controller accepts one chunk of at most `M` bytes at a time and asks
//! for the next one by sending its readiness literal. The scheduler owns the
//! pending command buffer and the active firmware transfer and decides what
//! the next chunk is:
//!
//! ```text
//!   Idle ──enqueue──▶ DrainingCommands ──buffer empty──▶ Idle
//!     │                     │
//!     └──begin firmware──▶ StreamingFirmware ──exhausted / failed / aborted──▶ (previous)
//! ```
//!
//! A firmware transfer always wins: while one is active, queued commands stay
//! buffered in order and no command byte is interleaved with image bytes.

use std::fmt;

use bytes::{Bytes, BytesMut};
use testerlink_core::{DELIM_DOLLAR, Error, LinkEvent, NUL, Result};

use crate::commands::cmd_firmware_announcement;
use crate::engine::{Action, Outbound};
use crate::firmware::FirmwareImage;
use crate::protocol::{check_framed, frame_command, needs_terminator, terminate};

/// Smallest usable chunk limit: one payload byte plus its NUL terminator.
pub const MIN_CHUNK_SIZE: usize = 2;

/// What the next readiness signal will be spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing to send.
    Idle,
    /// Commands are waiting in the pending buffer.
    DrainingCommands,
    /// A firmware image is being streamed.
    StreamingFirmware,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamState::Idle => write!(f, "idle"),
            StreamState::DrainingCommands => write!(f, "draining commands"),
            StreamState::StreamingFirmware => write!(f, "streaming firmware"),
        }
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: StreamState,
    pub connected: bool,
    /// Bytes waiting in the pending command buffer.
    pub pending: usize,
    /// `(sent, total)` of the active firmware transfer, if any.
    pub firmware: Option<(u64, u64)>,
}

/// The readiness-gated chunk scheduler.
#[derive(Debug)]
pub struct Scheduler {
    pending: BytesMut,
    firmware: Option<FirmwareImage>,
    chunk_size: usize,
    connected: bool,
}

impl Scheduler {
    /// Create a scheduler for chunk limit `chunk_size`.
    ///
    /// The link starts out connected; the IO task reports changes through
    /// [`Scheduler::set_connected`].
    pub fn new(chunk_size: usize) -> Self {
        Scheduler {
            pending: BytesMut::new(),
            firmware: None,
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE),
            connected: true,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn state(&self) -> StreamState {
        if self.firmware.is_some() {
            StreamState::StreamingFirmware
        } else if !self.pending.is_empty() {
            StreamState::DrainingCommands
        } else {
            StreamState::Idle
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Bytes waiting in the pending command buffer.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            state: self.state(),
            connected: self.connected,
            pending: self.pending.len(),
            firmware: self
                .firmware
                .as_ref()
                .map(|image| (image.position(), image.total())),
        }
    }

    /// Queue a command.
    ///
    /// The command must be a complete `#…#` or `$…$` frame; anything else is
    /// refused before the buffer changes. It is terminated with the NUL rule
    /// and appended to the pending buffer. When the buffer was empty, no transfer is running and
    /// the link is up, the controller is assumed idle and the first chunk is
    /// dispatched at once.
    pub fn enqueue(&mut self, cmd: &[u8]) -> Result<Vec<Action>> {
        check_framed(cmd)?;
        let frame = frame_command(cmd, false).ok_or(Error::EmptyCommand)?;
        let was_empty = self.pending.is_empty();
        self.pending.extend_from_slice(&frame);
        tracing::trace!(len = frame.len(), pending = self.pending.len(), "command queued");

        let mut actions = Vec::new();
        if was_empty && self.firmware.is_none() && self.connected {
            self.dispatch_command(&mut actions);
        }
        Ok(actions)
    }

    /// Start streaming `image`.
    ///
    /// Refused while disconnected or while another transfer is active. On
    /// success the announcement frame is written straight away, outside the
    /// chunk flow; image bytes follow on subsequent readiness signals.
    pub fn begin_firmware(&mut self, image: FirmwareImage) -> Result<Vec<Action>> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.firmware.is_some() {
            return Err(Error::FirmwareBusy);
        }

        let total = image.total();
        tracing::debug!(total, chunk_size = self.chunk_size, "firmware transfer started");
        self.firmware = Some(image);

        Ok(vec![
            Action::Write(Outbound::Announcement(Bytes::from(
                cmd_firmware_announcement(total),
            ))),
            Action::Emit(LinkEvent::FirmwareStarted { total }),
        ])
    }

    /// Cancel the active transfer, releasing the image. Queued commands are
    /// kept. A no-op when no transfer is active.
    pub fn abort_firmware(&mut self) -> Vec<Action> {
        match self.firmware.take() {
            Some(image) => {
                tracing::debug!(
                    sent = image.position(),
                    total = image.total(),
                    "firmware transfer aborted"
                );
                vec![Action::Emit(LinkEvent::FirmwareAborted {
                    sent: image.position(),
                    total: image.total(),
                })]
            }
            None => Vec::new(),
        }
    }

    /// The controller signalled it can take the next chunk.
    pub fn on_ready(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.connected {
            tracing::trace!("readiness while disconnected, ignored");
            return actions;
        }

        match self.state() {
            StreamState::StreamingFirmware => self.dispatch_firmware(&mut actions),
            StreamState::DrainingCommands => self.dispatch_command(&mut actions),
            StreamState::Idle => {}
        }
        actions
    }

    /// Record a connection change.
    ///
    /// Losing the link drops any active transfer and blocks dispatch.
    /// Regaining it with commands pending dispatches the first chunk, since a
    /// freshly connected controller is idle and will not ask on its own.
    pub fn set_connected(&mut self, connected: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        if connected == self.connected {
            return actions;
        }
        self.connected = connected;

        if connected {
            tracing::debug!(pending = self.pending.len(), "link connected");
            actions.push(Action::Emit(LinkEvent::Connected));
            if !self.pending.is_empty() {
                self.dispatch_command(&mut actions);
            }
        } else {
            tracing::debug!(pending = self.pending.len(), "link disconnected");
            actions.push(Action::Emit(LinkEvent::Disconnected));
            actions.extend(self.abort_firmware());
        }
        actions
    }

    fn dispatch_firmware(&mut self, actions: &mut Vec<Action>) {
        let Some(image) = self.firmware.as_mut() else {
            return;
        };
        let total = image.total();

        match image.read_chunk(self.chunk_size) {
            Ok(chunk) => {
                let sent = image.position();
                let done = image.is_exhausted();
                tracing::trace!(len = chunk.len(), sent, total, "firmware chunk");
                actions.push(Action::Write(Outbound::Firmware(Bytes::from(chunk))));
                actions.push(Action::Emit(LinkEvent::FirmwareProgress { sent, total }));
                if done {
                    self.firmware = None;
                    tracing::debug!(total, "firmware transfer complete");
                    actions.push(Action::Emit(LinkEvent::FirmwareComplete { total }));
                }
            }
            Err(e) => {
                let sent = image.position();
                self.firmware = None;
                tracing::warn!(sent, total, error = %e, "firmware transfer failed");
                actions.push(Action::Emit(LinkEvent::FirmwareFailed {
                    sent,
                    total,
                    reason: e.to_string(),
                }));
            }
        }
    }

    fn dispatch_command(&mut self, actions: &mut Vec<Action>) {
        if let Some(chunk) = self.next_command_chunk() {
            tracing::trace!(
                len = chunk.len(),
                pending = self.pending.len(),
                "command chunk"
            );
            actions.push(Action::Write(Outbound::Command(chunk)));
            if self.pending.is_empty() {
                tracing::debug!("command buffer drained");
            }
        }
    }

    /// Take the next chunk off the front of the pending buffer.
    ///
    /// The chunk is terminated with the NUL rule after it is cut. The cut
    /// moves back a byte when the terminator would push the chunk past the
    /// limit, and when it would separate a frame's `NUL` from its closing
    /// `$` (the lone `$` left behind would get a second NUL).
    fn next_command_chunk(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            return None;
        }

        let mut n = self.pending.len().min(self.chunk_size);
        while n > 1 && (self.overflows(n) || self.splits_terminator(n)) {
            n -= 1;
        }

        let mut chunk = self.pending.split_to(n);
        terminate(&mut chunk);
        Some(chunk.freeze())
    }

    fn overflows(&self, n: usize) -> bool {
        n + usize::from(needs_terminator(&self.pending[..n])) > self.chunk_size
    }

    fn splits_terminator(&self, n: usize) -> bool {
        self.pending[n - 1] == NUL && self.pending.get(n) == Some(&DELIM_DOLLAR)
    }
}
