//! # testerlink -- Flow-controlled link to the bench-tester controller
//!
//! `testerlink` drives the controller board of a printer bench tester over an
//! already-open serial line or Bluetooth socket. Operator intents (pump,
//! LEDs, heaters, raw pins, jog, homing) and firmware images are streamed in
//! chunks that the controller paces by sending a readiness line.
//!
//! ## Quick Start
//!
//! ```no_run
//! use testerlink::{LinkBuilder, LinkEvent, TransportKind};
//!
//! # async fn example(transport: Box<dyn testerlink::Transport>) -> testerlink::Result<()> {
//! let link = LinkBuilder::new()
//!     .transport_kind(TransportKind::Serial)
//!     .build_with_transport(transport);
//!
//! let mut events = link.subscribe();
//! link.home().await?;
//! link.pin_write("PC3", 1, 1).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let LinkEvent::Line(line) = event {
//!         println!("{line:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate                      | Purpose                                          |
//! |----------------------------|--------------------------------------------------|
//! | `testerlink-core`          | [`Transport`] trait, [`LinkEvent`], errors, wire constants |
//! | `testerlink-stream`        | Classifier, framer, pin codec, scheduler, IO task |
//! | `testerlink-test-harness`  | Scripted `MockTransport` for tests               |
//! | **`testerlink`**           | This facade crate -- builder, link handle, re-exports |
//!
//! ## Flow control
//!
//! A command queued on an idle link is written at once. Everything after
//! that waits for the controller's readiness line, one chunk of at most 64
//! (serial) or 256 (Bluetooth) bytes per signal. A firmware transfer, once
//! announced, takes every readiness signal until the image is exhausted;
//! commands queued meanwhile keep their order and go out afterwards.

pub mod builder;
pub mod link;

pub use builder::LinkBuilder;
pub use link::TesterLink;

pub use testerlink_core::{
    DELIM_DOLLAR, DELIM_HASH, Error, InboundLine, LinkEvent, READY_OK, READY_STRUCTURED, Result,
    Transport, TransportKind,
};
pub use testerlink_stream::commands::{Axis, Heater, PIN_MODE_INPUT, PIN_MODE_OUTPUT};
pub use testerlink_stream::{FirmwareImage, PinAddress, StreamState, StreamStatus, parse_pin_id};

/// The streaming engine, for callers that drive it without the IO task.
pub mod stream {
    pub use testerlink_stream::*;
}
