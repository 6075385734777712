//! Mock transport for deterministic testing of the tester link.
//!
//! [`MockTransport`] implements the [`Transport`] trait as a scripted
//! controller. Expectations pair an outbound chunk with the bytes the
//! controller answers with (usually the readiness literal); unsolicited lines
//! can be queued at any time; the connection can be dropped and restored; a
//! send can be made to fail or to write short.
//!
//! The IO task takes ownership of its transport, so every knob is reachable
//! through a cloneable [`MockHandle`] that shares state with the transport.
//!
//! # Example
//!
//! ```
//! use testerlink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When this chunk is written, answer with the readiness literal.
//! mock.expect(b"$G28 XY\0$", b"ok\n");
//! let handle = mock.handle();
//! handle.queue_inbound(b"T:210.5\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use testerlink_core::error::{Error, Result};
use testerlink_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to make readable once the request was sent.
    response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be returned by `receive()`.
    inbound: VecDeque<u8>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
    /// Error for the next `send()`, if it should fail.
    fail_next: Option<Error>,
    /// Byte count to report for the next `send()`, if it should write short.
    short_next: Option<usize>,
    /// Expectation mismatches seen so far.
    mismatches: Vec<String>,
}

/// A mock [`Transport`] for testing the link without a controller.
///
/// Expectations are consumed in order. When `send()` is called the data is
/// recorded; if an expectation is queued, the data must match it and the
/// expectation's response becomes readable. With no expectation queued the
/// send is simply recorded, so tests that only inspect [`sent_data`] need
/// not script every chunk.
///
/// [`sent_data`]: MockTransport::sent_data
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Shared control handle for a [`MockTransport`], usable after the transport
/// has been moved into an IO task.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                expectations: VecDeque::new(),
                inbound: VecDeque::new(),
                connected: true,
                sent_log: Vec::new(),
                fail_next: None,
                short_next: None,
                mismatches: Vec::new(),
            })),
        }
    }

    /// Get a control handle sharing this transport's state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, `response`
    /// becomes readable by subsequent `receive()` calls.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.handle().expect(request, response);
    }

    /// Queue bytes the controller sends without being asked.
    pub fn queue_inbound(&mut self, data: &[u8]) {
        self.handle().queue_inbound(data);
    }

    /// Return a copy of all data sent through this transport, one element
    /// per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.handle().sent_data()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.handle().remaining_expectations()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.handle().set_connected(connected);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// See [`MockTransport::expect`].
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        lock(&self.state).expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// See [`MockTransport::queue_inbound`].
    pub fn queue_inbound(&self, data: &[u8]) {
        lock(&self.state).inbound.extend(data.iter().copied());
    }

    /// See [`MockTransport::sent_data`].
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent_log.clone()
    }

    /// See [`MockTransport::remaining_expectations`].
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// See [`MockTransport::set_connected`].
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    /// Make the next `send()` fail with [`Error::Transport`]. The data is
    /// still recorded.
    pub fn fail_next_send(&self, message: &str) {
        self.fail_next_send_with(Error::Transport(message.to_string()));
    }

    /// Make the next `send()` fail with `error`, leaving the connection
    /// state alone. The data is still recorded.
    pub fn fail_next_send_with(&self, error: Error) {
        lock(&self.state).fail_next = Some(error);
    }

    /// Make the next `send()` report only `written` bytes accepted.
    pub fn short_next_send(&self, written: usize) {
        lock(&self.state).short_next = Some(written);
    }

    /// Sends that did not match the queued expectation, formatted for
    /// assertion messages.
    pub fn mismatches(&self) -> Vec<String> {
        lock(&self.state).mismatches.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }

        // Record what was sent.
        state.sent_log.push(data.to_vec());

        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        if let Some(expectation) = state.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                let message = format!(
                    "unexpected send data: expected {:02X?}, got {:02X?}",
                    expectation.request, data
                );
                state.mismatches.push(message.clone());
                return Err(Error::Transport(message));
            }
            state.inbound.extend(expectation.response);
        }

        let written = state.short_next.take().map_or(data.len(), |n| n.min(data.len()));
        Ok(written)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if !state.inbound.is_empty() {
                let n = state.inbound.len().min(buf.len());
                for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }

        // Nothing buffered: behave like a quiet line.
        tokio::time::sleep(timeout).await;
        Err(Error::Timeout)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
