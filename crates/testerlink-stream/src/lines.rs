//! Inbound line assembly.
//!
//! The transport hands over whatever bytes arrived since the last read; a
//! controller line may be split across several reads or several lines may
//! arrive in one. [`LineAssembler`] buffers the partial tail and yields
//! complete, trimmed, non-empty lines.

use bytes::{Bytes, BytesMut};

/// Default bound on a partial line.
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Accumulates raw receive runs into newline-terminated lines.
#[derive(Debug)]
pub struct LineAssembler {
    buf: BytesMut,
    max_len: usize,
}

impl LineAssembler {
    pub fn new(max_len: usize) -> Self {
        LineAssembler {
            buf: BytesMut::with_capacity(256),
            max_len: max_len.max(1),
        }
    }

    /// Feed received bytes and collect every line they complete.
    ///
    /// Lines are split on `\n` and trimmed of ASCII whitespace at both ends
    /// (so `\r\n` endings work). Empty lines are dropped. When the partial
    /// line grows past the bound it is discarded with a warning.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        let mut lines = Vec::new();

        for chunk in data.split_inclusive(|&b| b == b'\n') {
            self.buf.extend_from_slice(chunk);

            if self.buf.last() == Some(&b'\n') {
                let raw = self.buf.split().freeze();
                let line = trim(raw);
                if !line.is_empty() {
                    tracing::trace!(len = line.len(), "line assembled");
                    lines.push(line);
                }
            } else if self.buf.len() > self.max_len {
                tracing::warn!(
                    len = self.buf.len(),
                    max = self.max_len,
                    "line buffer overflow, discarding partial line"
                );
                self.buf.clear();
            }
        }

        lines
    }

    /// Bytes of the current partial line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial line, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        LineAssembler::new(DEFAULT_MAX_LINE_LEN)
    }
}

fn trim(line: Bytes) -> Bytes {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    line.slice(start..end)
}
