//! Shared wire-level types for the tester link.
//!
//! These types are deliberately free of I/O so that the streaming engine,
//! the test harness, and applications can share them without pulling in a
//! runtime.

use std::fmt;

use bytes::Bytes;

/// Frame delimiter opening a `#…#` frame (structured messages).
pub const DELIM_HASH: u8 = b'#';

/// Frame delimiter opening a `$…$` frame (G-code style commands).
pub const DELIM_DOLLAR: u8 = b'$';

/// Terminator marker placed before the closing `$` of a command frame.
pub const NUL: u8 = 0;

/// Readiness literal sent by controllers speaking the structured protocol.
pub const READY_STRUCTURED: &[u8] = br#"#{"infoOther":{"okToReceive":true}}#"#;

/// Readiness literal sent by controllers speaking the plain protocol.
pub const READY_OK: &[u8] = b"ok";

/// Prefix of an error line reported by the controller.
pub const ERROR_PREFIX: &[u8] = b"ERRO:";

/// Whether `byte` is one of the two frame delimiters.
pub fn is_delimiter(byte: u8) -> bool {
    byte == DELIM_HASH || byte == DELIM_DOLLAR
}

/// The physical link variant. Fixes the chunk limit for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// USB or RS-232 serial line.
    Serial,
    /// Bluetooth RFCOMM socket.
    #[default]
    Bluetooth,
}

impl TransportKind {
    /// Largest number of bytes a single transport write may carry.
    pub fn chunk_size(self) -> usize {
        match self {
            TransportKind::Serial => 64,
            TransportKind::Bluetooth => 256,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Bluetooth => write!(f, "bluetooth"),
        }
    }
}

/// One inbound line, classified.
///
/// Every field is a slice of the received line; classification never copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// The controller is idle and will accept the next chunk.
    Readiness,
    /// An error report, e.g. `ERRO:motor stall`.
    Error {
        /// Always the five bytes `ERRO:`.
        label: Bytes,
        /// Everything after the label.
        remainder: Bytes,
    },
    /// A tagged telemetry value, e.g. `T:210.5`.
    Telemetry {
        /// The letter and its colon (`T:`).
        tag: Bytes,
        /// Everything after the tag.
        remainder: Bytes,
    },
    /// Raw protocol traffic starting with `#` or `$`.
    Framed(Bytes),
    /// Anything else.
    Plain(Bytes),
}

impl InboundLine {
    /// Whether this is the readiness signal.
    pub fn is_readiness(&self) -> bool {
        matches!(self, InboundLine::Readiness)
    }
}
