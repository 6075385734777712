//! testerlink-stream: Readiness-gated command and firmware streaming for the
//! bench-tester controller.
//!
//! The controller reads at most one chunk at a time and asks for the next by
//! sending a readiness line. This crate holds everything between an operator
//! intent and the bytes on the wire:
//!
//! - [`protocol`] -- line classifier and frame/NUL-terminator rules
//! - [`pin`] -- pin token codec (`PC3` -> `35`)
//! - [`commands`] -- pure builders for tester commands
//! - [`firmware`] -- forward-only firmware image source
//! - [`lines`] -- inbound line assembly
//! - [`scheduler`] -- the pending buffer, firmware priority, and chunking
//! - [`engine`] -- synchronous `Input` -> `Action` core
//! - [`io`] -- the tokio task that owns the transport

pub mod commands;
pub mod engine;
pub mod firmware;
pub mod io;
pub mod lines;
pub mod pin;
pub mod protocol;
pub mod scheduler;

pub use engine::{Action, Engine, Input, Outbound};
pub use firmware::FirmwareImage;
pub use io::{IoConfig, LinkIo, Request, spawn_io_task};
pub use lines::LineAssembler;
pub use pin::{PinAddress, parse_pin_id};
pub use scheduler::{Scheduler, StreamState, StreamStatus};
