//! Line framing for the inbound byte stream
//!
//! IRC servers terminate lines with CRLF, but a read from the socket can end anywhere:
//! mid-line, between the CR and the LF, or inside a multi-byte UTF-8 sequence. The framer
//! splits on either terminator byte and carries the unterminated tail over to the next read.

use std::time::Instant;

/// Upper bound on a carried-over fragment before it is discarded
pub const DEFAULT_MAX_FRAGMENT: usize = 64 * 1024;

/// Turns raw socket reads into complete protocol lines
#[derive(Debug)]
pub struct LineFramer {
    /// Bytes after the last terminator seen so far
    fragment: Vec<u8>,
    /// Maximum fragment size in bytes
    max_fragment: usize,
    /// Number of bytes discarded because a fragment grew too large
    dropped_bytes: u64,
    /// Inside an oversized line whose head was dropped; skip to the next terminator
    discarding: bool,
    /// Last time data was fed in
    last_read: Option<Instant>,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAGMENT)
    }
}

impl LineFramer {
    /// Create a framer that holds at most `max_fragment` unterminated bytes
    pub fn new(max_fragment: usize) -> Self {
        Self {
            fragment: Vec::new(),
            max_fragment,
            dropped_bytes: 0,
            discarding: false,
            last_read: None,
        }
    }

    /// Feed a chunk and return every line it completes, in arrival order.
    ///
    /// Empty lines (including the gap between CR and LF) are discarded. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.last_read = Some(Instant::now());
        let mut lines = Vec::new();
        let mut start = 0;

        for (i, byte) in chunk.iter().enumerate() {
            if *byte == b'\r' || *byte == b'\n' {
                if self.discarding {
                    self.dropped_bytes += (i - start) as u64;
                    self.discarding = false;
                } else if self.fragment.is_empty() {
                    if i > start {
                        lines.push(String::from_utf8_lossy(&chunk[start..i]).into_owned());
                    }
                } else {
                    self.fragment.extend_from_slice(&chunk[start..i]);
                    let line = std::mem::take(&mut self.fragment);
                    lines.push(String::from_utf8_lossy(&line).into_owned());
                }
                start = i + 1;
            }
        }

        if start < chunk.len() {
            let tail = &chunk[start..];
            if self.discarding {
                self.dropped_bytes += tail.len() as u64;
            } else if self.fragment.len() + tail.len() > self.max_fragment {
                let dropped = self.fragment.len() + tail.len();
                self.dropped_bytes += dropped as u64;
                tracing::warn!(
                    "Line fragment exceeded {} bytes, discarding the rest of the line",
                    self.max_fragment
                );
                self.fragment.clear();
                self.discarding = true;
            } else {
                self.fragment.extend_from_slice(tail);
            }
        }

        lines
    }

    /// Bytes currently waiting for a terminator
    pub fn pending(&self) -> usize {
        self.fragment.len()
    }

    /// Number of bytes discarded due to oversized fragments
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Time of the last feed
    pub fn last_read(&self) -> Option<Instant> {
        self.last_read
    }

    /// Forget any partial line
    pub fn clear(&mut self) {
        self.fragment.clear();
        self.discarding = false;
    }
}
