//! testerlink-core: Core traits, types, and error definitions for the
//! bench-tester link.
//!
//! This crate defines the transport-agnostic pieces shared by the streaming
//! engine, the test harness, and applications.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level channel to the controller
//! - [`InboundLine`] -- a classified line received from the controller
//! - [`LinkEvent`] -- notifications for the status display
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use events::LinkEvent;
pub use transport::Transport;
pub use types::*;
