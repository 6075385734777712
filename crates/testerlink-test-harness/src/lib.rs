//! testerlink-test-harness: Test utilities and a scripted mock transport for
//! the tester link.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the streaming engine and the link facade without a real controller.

pub mod mock_transport;

pub use mock_transport::{MockHandle, MockTransport};
