//! Link event types.
//!
//! Events are emitted by the IO task through a `tokio::sync::broadcast`
//! channel. The operator-facing status display subscribes to them and decides
//! how lines are colored or filtered. The core never does.

use crate::types::InboundLine;

/// An event emitted by the link for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A non-readiness line received from the controller, unchanged.
    Line(InboundLine),

    /// A local, recoverable problem (failed or short write).
    Warning(String),

    /// A firmware transfer was announced to the controller.
    FirmwareStarted {
        /// Declared image length in bytes.
        total: u64,
    },

    /// A firmware chunk was dispatched.
    FirmwareProgress {
        /// Bytes dispatched so far.
        sent: u64,
        /// Declared image length in bytes.
        total: u64,
    },

    /// The last firmware chunk was dispatched.
    FirmwareComplete {
        /// Declared image length in bytes.
        total: u64,
    },

    /// Reading the firmware image failed; the transfer was dropped.
    FirmwareFailed {
        /// Bytes dispatched before the failure.
        sent: u64,
        /// Declared image length in bytes.
        total: u64,
        /// Human-readable cause.
        reason: String,
    },

    /// The transfer was cancelled by the operator or by a disconnect.
    FirmwareAborted {
        /// Bytes dispatched before the abort.
        sent: u64,
        /// Declared image length in bytes.
        total: u64,
    },

    /// The transport reported it is connected again.
    Connected,

    /// The transport reported it lost the connection.
    Disconnected,
}
