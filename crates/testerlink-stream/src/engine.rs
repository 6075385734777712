//! Synchronous protocol engine.
//!
//! [`Engine`] is the single-threaded heart of the link. It takes one
//! [`Input`] at a time, updates the scheduler, and returns the [`Action`]s
//! the caller must perform, in order. It never touches a transport, so every
//! protocol rule can be exercised without a runtime.

use bytes::Bytes;
use testerlink_core::{LinkEvent, READY_STRUCTURED, Result};

use crate::firmware::FirmwareImage;
use crate::protocol::classify;
use crate::scheduler::{Scheduler, StreamStatus};

/// An event delivered to the engine.
#[derive(Debug)]
pub enum Input {
    /// A command to queue. Framed with the NUL rule on entry.
    NewCommand(Bytes),
    /// Announce and start streaming a firmware image.
    BeginFirmwareTransfer(FirmwareImage),
    /// Cancel the active firmware transfer.
    AbortFirmwareTransfer,
    /// The readiness literal arrived. Equivalent to a `LineReceived` of it.
    ReadinessReceived,
    /// A complete, trimmed line from the controller.
    LineReceived(Bytes),
    /// The transport's connection state, sampled by the IO task.
    ConnectionChanged(bool),
}

/// Bytes to hand to the transport as one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A chunk of the pending command buffer.
    Command(Bytes),
    /// A chunk of the firmware image.
    Firmware(Bytes),
    /// The firmware announcement frame.
    Announcement(Bytes),
}

impl Outbound {
    pub fn bytes(&self) -> &Bytes {
        match self {
            Outbound::Command(b) | Outbound::Firmware(b) | Outbound::Announcement(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Command(_) => "command",
            Outbound::Firmware(_) => "firmware",
            Outbound::Announcement(_) => "announcement",
        }
    }
}

/// Something the caller of [`Engine::handle`] must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Write(Outbound),
    Emit(LinkEvent),
}

/// Classifier plus scheduler behind a single entry point.
#[derive(Debug)]
pub struct Engine {
    scheduler: Scheduler,
    readiness: Bytes,
}

impl Engine {
    /// Create an engine with chunk limit `chunk_size` and the structured
    /// readiness literal.
    pub fn new(chunk_size: usize) -> Self {
        Engine::with_readiness(chunk_size, Bytes::from_static(READY_STRUCTURED))
    }

    /// Create an engine that treats `readiness` as the controller's
    /// "send more" line.
    pub fn with_readiness(chunk_size: usize, readiness: impl Into<Bytes>) -> Self {
        Engine {
            scheduler: Scheduler::new(chunk_size),
            readiness: readiness.into(),
        }
    }

    pub fn readiness(&self) -> &[u8] {
        &self.readiness
    }

    pub fn chunk_size(&self) -> usize {
        self.scheduler.chunk_size()
    }

    pub fn is_connected(&self) -> bool {
        self.scheduler.is_connected()
    }

    pub fn status(&self) -> StreamStatus {
        self.scheduler.status()
    }

    /// Process one input to completion.
    ///
    /// Validation failures (an empty command, a transfer that cannot start)
    /// return `Err` and leave the engine unchanged.
    pub fn handle(&mut self, input: Input) -> Result<Vec<Action>> {
        match input {
            Input::NewCommand(cmd) => self.scheduler.enqueue(&cmd),
            Input::BeginFirmwareTransfer(image) => self.scheduler.begin_firmware(image),
            Input::AbortFirmwareTransfer => Ok(self.scheduler.abort_firmware()),
            Input::ReadinessReceived => Ok(self.scheduler.on_ready()),
            Input::LineReceived(line) => Ok(self.on_line(line)),
            Input::ConnectionChanged(connected) => Ok(self.scheduler.set_connected(connected)),
        }
    }

    fn on_line(&mut self, line: Bytes) -> Vec<Action> {
        if line.is_empty() {
            return Vec::new();
        }
        let line = classify(line, &self.readiness);
        if line.is_readiness() {
            tracing::trace!("readiness");
            return self.scheduler.on_ready();
        }
        tracing::trace!(line = ?line, "line received");
        vec![Action::Emit(LinkEvent::Line(line))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::StreamState;
    use testerlink_core::{Error, InboundLine, READY_OK};

    fn line(s: &'static [u8]) -> Input {
        Input::LineReceived(Bytes::from_static(s))
    }

    #[test]
    fn immediate_dispatch_through_engine() {
        let mut engine = Engine::new(64);
        let actions = engine
            .handle(Input::NewCommand(Bytes::from_static(b"$G28 XY$")))
            .unwrap();
        assert_eq!(
            actions,
            vec![Action::Write(Outbound::Command(Bytes::from_static(
                b"$G28 XY\0$"
            )))]
        );
    }

    #[test]
    fn readiness_line_drives_scheduler() {
        let mut engine = Engine::new(64);
        let mut frame = vec![b'x'; 194];
        frame[0] = b'#';
        frame[193] = b'#';
        engine.handle(Input::NewCommand(Bytes::from(frame))).unwrap();

        let actions = engine.handle(line(READY_STRUCTURED)).unwrap();
        assert!(matches!(actions.as_slice(), [Action::Write(Outbound::Command(c))] if c.len() == 64));
    }

    #[test]
    fn ok_readiness_when_configured() {
        let mut engine = Engine::with_readiness(8, READY_OK);
        let first = engine
            .handle(Input::NewCommand(Bytes::from_static(b"#0123456789#")))
            .unwrap();
        assert_eq!(
            first,
            vec![Action::Write(Outbound::Command(Bytes::from_static(b"#0123456")))]
        );
        assert_eq!(engine.status().state, StreamState::DrainingCommands);

        let actions = engine.handle(line(b"ok")).unwrap();
        assert_eq!(
            actions,
            vec![Action::Write(Outbound::Command(Bytes::from_static(b"789#")))]
        );
        assert_eq!(engine.status().state, StreamState::Idle);
    }

    #[test]
    fn non_readiness_lines_are_forwarded() {
        let mut engine = Engine::new(64);
        let actions = engine.handle(line(b"ERRO:motor stall")).unwrap();
        assert_eq!(
            actions,
            vec![Action::Emit(LinkEvent::Line(InboundLine::Error {
                label: Bytes::from_static(b"ERRO:"),
                remainder: Bytes::from_static(b"motor stall"),
            }))]
        );

        let actions = engine.handle(line(b"T:210.5")).unwrap();
        assert!(matches!(
            actions.as_slice(),
            [Action::Emit(LinkEvent::Line(InboundLine::Telemetry { .. }))]
        ));

        // "ok" is plain text under the structured literal.
        let actions = engine.handle(line(b"ok")).unwrap();
        assert_eq!(
            actions,
            vec![Action::Emit(LinkEvent::Line(InboundLine::Plain(
                Bytes::from_static(b"ok")
            )))]
        );
    }

    #[test]
    fn lines_do_not_change_state() {
        let mut engine = Engine::new(64);
        engine.handle(Input::ConnectionChanged(false)).unwrap();
        engine
            .handle(Input::NewCommand(Bytes::from_static(b"#abc#")))
            .unwrap();
        let before = engine.status();
        engine.handle(line(b"tester mode")).unwrap();
        engine.handle(line(b"$L5 T0 S1$")).unwrap();
        assert_eq!(engine.status(), before);
    }

    #[test]
    fn empty_line_is_ignored() {
        let mut engine = Engine::new(64);
        assert!(engine.handle(Input::LineReceived(Bytes::new())).unwrap().is_empty());
    }

    #[test]
    fn firmware_scenario() {
        let mut engine = Engine::new(64);
        let image = FirmwareImage::from_bytes(vec![0x55; 10]).unwrap();
        let actions = engine.handle(Input::BeginFirmwareTransfer(image)).unwrap();
        assert_eq!(
            actions[0],
            Action::Write(Outbound::Announcement(Bytes::from_static(
                b"#{\"cmdFirmwareUpdate\":10}#"
            )))
        );

        engine
            .handle(Input::NewCommand(Bytes::from_static(b"#12#")))
            .unwrap();
        engine
            .handle(Input::NewCommand(Bytes::from_static(b"#3#")))
            .unwrap();

        let actions = engine.handle(Input::ReadinessReceived).unwrap();
        assert_eq!(actions[0], Action::Write(Outbound::Firmware(Bytes::from(vec![0x55; 10]))));
        assert_eq!(engine.status().state, StreamState::DrainingCommands);

        let actions = engine.handle(Input::ReadinessReceived).unwrap();
        assert_eq!(
            actions,
            vec![Action::Write(Outbound::Command(Bytes::from_static(b"#12##3#")))]
        );
        assert_eq!(engine.status().state, StreamState::Idle);
    }

    #[test]
    fn validation_errors_leave_engine_unchanged() {
        let mut engine = Engine::new(64);
        assert!(matches!(
            engine.handle(Input::NewCommand(Bytes::new())),
            Err(Error::EmptyCommand)
        ));
        engine
            .handle(Input::BeginFirmwareTransfer(
                FirmwareImage::from_bytes(vec![1; 3]).unwrap(),
            ))
            .unwrap();
        let before = engine.status();
        assert!(matches!(
            engine.handle(Input::BeginFirmwareTransfer(
                FirmwareImage::from_bytes(vec![1; 3]).unwrap(),
            )),
            Err(Error::FirmwareBusy)
        ));
        assert_eq!(engine.status(), before);
    }

    #[test]
    fn abort_through_engine() {
        let mut engine = Engine::new(64);
        engine
            .handle(Input::BeginFirmwareTransfer(
                FirmwareImage::from_bytes(vec![1; 3]).unwrap(),
            ))
            .unwrap();
        let actions = engine.handle(Input::AbortFirmwareTransfer).unwrap();
        assert_eq!(
            actions,
            vec![Action::Emit(LinkEvent::FirmwareAborted { sent: 0, total: 3 })]
        );
        assert_eq!(engine.status().state, StreamState::Idle);
    }
}
