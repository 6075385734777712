//! LinkBuilder -- fluent builder for constructing [`TesterLink`] instances.
//!
//! Separates configuration from construction so that callers can pick the
//! transport variant, the readiness literal, and the IO-loop timing before
//! handing over an open transport.
//!
//! # Example
//!
//! ```no_run
//! use testerlink::{LinkBuilder, TransportKind, READY_OK};
//!
//! # async fn example(transport: Box<dyn testerlink::Transport>) -> testerlink::Result<()> {
//! let link = LinkBuilder::new()
//!     .transport_kind(TransportKind::Serial)
//!     .readiness_literal(READY_OK)
//!     .build_with_transport(transport);
//! link.home().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;

use testerlink_core::transport::Transport;
use testerlink_core::types::{READY_STRUCTURED, TransportKind};
use testerlink_stream::io::{IoConfig, spawn_io_task};
use testerlink_stream::lines::DEFAULT_MAX_LINE_LEN;
use testerlink_stream::scheduler::MIN_CHUNK_SIZE;

use crate::link::TesterLink;

/// Fluent builder for [`TesterLink`].
///
/// Every setting has a default, so the simplest usage is:
///
/// ```ignore
/// let link = LinkBuilder::new().build_with_transport(transport);
/// ```
pub struct LinkBuilder {
    transport_kind: TransportKind,
    chunk_size: Option<usize>,
    readiness: Bytes,
    poll_interval: Duration,
    max_line_len: usize,
    event_capacity: usize,
}

impl LinkBuilder {
    /// Create a builder with Bluetooth chunking and the structured readiness
    /// literal.
    pub fn new() -> Self {
        LinkBuilder {
            transport_kind: TransportKind::default(),
            chunk_size: None,
            readiness: Bytes::from_static(READY_STRUCTURED),
            poll_interval: Duration::from_millis(50),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            event_capacity: 64,
        }
    }

    /// Set the physical link variant; picks the default chunk limit
    /// (serial 64, Bluetooth 256).
    pub fn transport_kind(mut self, kind: TransportKind) -> Self {
        self.transport_kind = kind;
        self
    }

    /// Override the chunk limit. Values below 2 are raised to 2.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Set the line the controller sends when it can take the next chunk.
    pub fn readiness_literal(mut self, literal: impl Into<Bytes>) -> Self {
        self.readiness = literal.into();
        self
    }

    /// Set the receive timeout per IO-loop iteration (default: 50ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the bound on a partial inbound line (default: 4096).
    pub fn max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }

    /// Set the event channel capacity (default: 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Effective chunk limit.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size
            .unwrap_or_else(|| self.transport_kind.chunk_size())
            .max(MIN_CHUNK_SIZE)
    }

    fn io_config(&self) -> IoConfig {
        IoConfig {
            chunk_size: self.effective_chunk_size(),
            readiness: self.readiness.clone(),
            poll_interval: self.poll_interval,
            max_line_len: self.max_line_len,
        }
    }

    /// Build a [`TesterLink`] over an already-open transport.
    ///
    /// Spawns the IO task, so this must run inside a tokio runtime. Pass a
    /// `MockTransport` from `testerlink-test-harness` to test without a
    /// controller.
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> TesterLink {
        let config = self.io_config();
        tracing::debug!(
            kind = %self.transport_kind,
            chunk_size = config.chunk_size,
            "building tester link"
        );
        let (event_tx, _) = broadcast::channel(self.event_capacity);
        let io = spawn_io_task(transport, config.clone(), event_tx.clone());
        TesterLink::new(io, event_tx, self.transport_kind, config.chunk_size)
    }
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
