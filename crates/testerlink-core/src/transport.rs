//! Transport trait for controller communication.
//!
//! The [`Transport`] trait abstracts over the already-open byte channel to the
//! controller: a serial line or an RFCOMM socket. Discovering and opening
//! that channel happens outside this workspace; the protocol engine only ever
//! sees a connected (or disconnected) `Transport`.
//!
//! The streaming engine in `testerlink-stream` operates on a `Transport`
//! rather than a concrete port, which keeps it deterministic under test with
//! `MockTransport` from the `testerlink-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the controller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write raw bytes to the controller.
    ///
    /// Returns the number of bytes the transport accepted. A count lower than
    /// `data.len()` is a short write; callers report it but do not retry.
    async fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Receive bytes from the controller into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data and
    /// returns [`Error::Timeout`](crate::error::Error::Timeout) if nothing
    /// arrives. Line splitting is done by the caller.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
