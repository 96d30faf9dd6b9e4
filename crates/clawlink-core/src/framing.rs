//! # Line Framing
//!
//! Every message on the link is one compact JSON object followed by `\n`.
//! [`LineFramer`] sits on top of a [`Link`] and handles both directions:
//!
//! | Direction | Call | Behaviour |
//! |-----------|------|-----------|
//! | out | [`LineFramer::write_message`] | serialize, append `\n`, write, flush |
//! | in | [`LineFramer::try_read_line`] | non-blocking; returns a line once a `\n` arrives |
//!
//! ## Example
//!
//! ```rust,ignore
//! use clawlink_core::{LineFramer, MemoryLink, Request, Instruction};
//!
//! let (host, device) = MemoryLink::pair();
//! let mut framer = LineFramer::new(host);
//! framer.write_message(&Request::new(Instruction::ListTools))?;
//! while let Some(line) = framer.try_read_line()? {
//!     println!("{line}");
//! }
//! ```
//!
//! Incoming bytes are split on raw `\n` before UTF-8 decoding, so a
//! multi-byte character that straddles two reads is reassembled intact.

use serde::Serialize;
use tracing::{debug, warn};

use crate::link::Link;

/// Default bound on a single incoming line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024;

const READ_CHUNK: usize = 256;

/// Newline-delimited JSON framing over a [`Link`].
///
/// # Thread Safety
///
/// Not shared between threads. Each side of the link owns one framer.
pub struct LineFramer<L: Link> {
    link: L,
    buffer: Vec<u8>,
    max_line_bytes: usize,
    /// Set after an oversized line; bytes are dropped until the next `\n`.
    discarding: bool,
}

impl<L: Link> LineFramer<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            buffer: Vec::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            discarding: false,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Serialize `message` as one line and flush it.
    pub fn write_message<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), FramingError> {
        let payload = serde_json::to_string(message)?;
        self.write_line(&payload)
    }

    /// Write a pre-encoded line. The terminating `\n` is added here.
    pub fn write_line(&mut self, line: &str) -> Result<(), FramingError> {
        if line.contains('\n') {
            return Err(FramingError::EmbeddedNewline);
        }
        self.link.write_all(line.as_bytes())?;
        self.link.write_all(b"\n")?;
        self.link.flush()?;
        Ok(())
    }

    /// Next complete, non-blank line, or `None` if none is buffered yet.
    ///
    /// Partial input stays buffered for the next call. Lines that are not
    /// valid UTF-8 are dropped.
    pub fn try_read_line(&mut self) -> Result<Option<String>, FramingError> {
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let raw: Vec<u8> = self.buffer.drain(..=end).collect();
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if raw.len() - 1 > self.max_line_bytes {
                    warn!(
                        length = raw.len() - 1,
                        limit = self.max_line_bytes,
                        "incoming line exceeds limit, discarding"
                    );
                    continue;
                }
                if let Some(line) = decode_line(&raw) {
                    return Ok(Some(line));
                }
            }

            if self.discarding {
                self.buffer.clear();
            } else if self.buffer.len() > self.max_line_bytes {
                warn!(
                    buffered = self.buffer.len(),
                    limit = self.max_line_bytes,
                    "incoming line exceeds limit, discarding"
                );
                self.buffer.clear();
                self.discarding = true;
            }

            let read = self.link.read_available(&mut chunk)?;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes received but not yet returned as a line.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let Ok(text) = std::str::from_utf8(raw) else {
        debug!(bytes = raw.len(), "dropping line that is not valid UTF-8");
        return None;
    };
    let line = text.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_owned())
    }
}

/// Error type for framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("outgoing line contains a raw newline")]
    EmbeddedNewline,
}
