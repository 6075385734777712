//! Error types for the tester link.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Validation refusals, transport failures,
//! and firmware-transfer failures are all captured here.

use std::path::PathBuf;

/// The error type for all tester-link operations.
///
/// Variants fall into three groups: validation refusals raised before any
/// state changes (malformed pin token, unframed input, unusable firmware
/// image), transport failures, and failures of an active firmware transfer.
/// None of them is fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial line, RFCOMM socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport is not connected to the controller.
    #[error("not connected")]
    NotConnected,

    /// The connection to the controller was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// Timed out waiting for data from the controller.
    #[error("timeout waiting for data")]
    Timeout,

    /// The IO task or an event stream has gone away.
    #[error("stream closed")]
    StreamClosed,

    /// The pin token does not name a controller pin.
    #[error("invalid pin: {0}")]
    InvalidPin(String),

    /// A command is not a `#…#` or `$…$` frame.
    #[error("input is not a delimited frame")]
    UnframedInput,

    /// An empty command was submitted.
    #[error("empty command")]
    EmptyCommand,

    /// The firmware image does not exist.
    #[error("firmware image not found: {}", .0.display())]
    FirmwareNotFound(PathBuf),

    /// The firmware image has zero length.
    #[error("firmware image is empty")]
    EmptyFirmware,

    /// A firmware transfer is already in progress.
    #[error("firmware transfer already in progress")]
    FirmwareBusy,

    /// Reading the firmware image failed mid-transfer.
    #[error("firmware read failed: {0}")]
    FirmwareRead(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the link to the controller is down.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::NotConnected | Error::ConnectionLost)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
