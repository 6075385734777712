//! The operator-facing link handle.
//!
//! [`TesterLink`] turns operator intents into framed commands and hands them
//! to the IO task. Every intent goes through the same readiness-gated queue;
//! nothing bypasses flow control except the firmware announcement.

use std::path::Path;

use bytes::Bytes;
use tokio::sync::broadcast;

use testerlink_core::error::Result;
use testerlink_core::events::LinkEvent;
use testerlink_core::transport::Transport;
use testerlink_core::types::TransportKind;
use testerlink_stream::commands::{self, Axis, Heater};
use testerlink_stream::firmware::FirmwareImage;
use testerlink_stream::io::LinkIo;
use testerlink_stream::pin::PinAddress;
use testerlink_stream::protocol::frame_operator_input;
use testerlink_stream::scheduler::StreamStatus;

/// A running link to the bench-tester controller.
pub struct TesterLink {
    io: LinkIo,
    event_tx: broadcast::Sender<LinkEvent>,
    transport_kind: TransportKind,
    chunk_size: usize,
}

impl TesterLink {
    pub(crate) fn new(
        io: LinkIo,
        event_tx: broadcast::Sender<LinkEvent>,
        transport_kind: TransportKind,
        chunk_size: usize,
    ) -> Self {
        TesterLink {
            io,
            event_tx,
            transport_kind,
            chunk_size,
        }
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    /// Chunk limit in effect for this connection.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Subscribe to link events (received lines, warnings, transfer
    /// progress, connection changes).
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot the scheduler.
    pub async fn status(&self) -> Result<StreamStatus> {
        self.io.status().await
    }

    // -----------------------------------------------------------------
    // Raw commands
    // -----------------------------------------------------------------

    /// Queue an already-framed command. The NUL terminator rule is applied
    /// on entry. Anything that is not a complete `#…#` or `$…$` frame is
    /// refused with `Error::UnframedInput` and nothing is queued.
    pub async fn send_command(&self, cmd: impl Into<Bytes>) -> Result<()> {
        self.io.command(cmd).await
    }

    /// Queue free text typed by the operator.
    ///
    /// The text must open with `#` or `$`; a missing closing delimiter is
    /// added. Unframed or empty input is refused and nothing is queued.
    pub async fn send_operator_input(&self, input: &str) -> Result<()> {
        let frame = frame_operator_input(input.as_bytes())?;
        self.io.command(frame).await
    }

    async fn send_built(&self, cmd: Vec<u8>) -> Result<()> {
        self.io.command(cmd).await
    }

    // -----------------------------------------------------------------
    // Tester functions
    // -----------------------------------------------------------------

    pub async fn pump(&self, on: bool, value: u32) -> Result<()> {
        self.send_built(commands::cmd_pump(on, value)).await
    }

    pub async fn button_led(&self, station: u8) -> Result<()> {
        self.send_built(commands::cmd_button_led(station)).await
    }

    pub async fn power_led(&self, station: u8) -> Result<()> {
        self.send_built(commands::cmd_power_led(station)).await
    }

    pub async fn flow_logging(&self, on: bool) -> Result<()> {
        self.send_built(commands::cmd_flow_logging(on)).await
    }

    pub async fn temperature_logging(&self, on: bool) -> Result<()> {
        self.send_built(commands::cmd_temperature_logging(on)).await
    }

    /// Sound the beeper at `frequency`, or silence it with `None`.
    pub async fn beeper(&self, frequency: Option<u32>) -> Result<()> {
        let cmd = match frequency {
            Some(f) => commands::cmd_beeper_on(f),
            None => commands::cmd_beeper_off(),
        };
        self.send_built(cmd).await
    }

    pub async fn water_heating(&self, on: bool) -> Result<()> {
        self.send_built(commands::cmd_water_heating(on)).await
    }

    /// Drive a heater with a PWM duty value; `None` switches it off.
    pub async fn heater(&self, heater: Heater, pwm: Option<u32>) -> Result<()> {
        tracing::debug!(heater = heater.label(), pwm = ?pwm, "heater command");
        self.send_built(commands::cmd_heater(heater, pwm)).await
    }

    // -----------------------------------------------------------------
    // Raw pins
    // -----------------------------------------------------------------

    /// Write `value` to the pin named by `token` (e.g. `PC3`).
    ///
    /// An invalid token is refused with `Error::InvalidPin` before anything
    /// is queued.
    pub async fn pin_write(&self, token: &str, mode: u8, value: u32) -> Result<()> {
        let pin = PinAddress::parse(token)?;
        self.send_built(commands::cmd_pin_write(pin, mode, value)).await
    }

    /// Request a read of the pin named by `token`. The value arrives as a
    /// line event.
    pub async fn pin_read(&self, token: &str, mode: u8) -> Result<()> {
        let pin = PinAddress::parse(token)?;
        self.send_built(commands::cmd_pin_read(pin, mode)).await
    }

    // -----------------------------------------------------------------
    // Motion
    // -----------------------------------------------------------------

    pub async fn jog(&self, axis: Axis, forward: bool) -> Result<()> {
        self.send_built(commands::cmd_jog(axis, forward)).await
    }

    pub async fn home(&self) -> Result<()> {
        self.send_built(commands::cmd_home()).await
    }

    pub async fn travel_to_station(&self, station: u8) -> Result<()> {
        self.send_built(commands::cmd_travel_to_station(station))
            .await
    }

    pub async fn leave_tester_mode(&self) -> Result<()> {
        self.send_built(commands::cmd_leave_tester_mode()).await
    }

    // -----------------------------------------------------------------
    // Firmware
    // -----------------------------------------------------------------

    /// Announce and start streaming `image`. Image bytes follow one chunk
    /// per readiness signal; progress is reported as events.
    pub async fn begin_firmware_update(&self, image: FirmwareImage) -> Result<()> {
        self.io.begin_firmware(image).await
    }

    /// Open an image file and start streaming it.
    pub async fn begin_firmware_update_from_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let image = FirmwareImage::open(path)?;
        self.begin_firmware_update(image).await
    }

    /// Cancel the active firmware transfer. Queued commands are kept.
    pub async fn abort_firmware(&self) -> Result<()> {
        self.io.abort_firmware().await
    }

    /// Stop the IO task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        self.io.shutdown().await
    }
}
