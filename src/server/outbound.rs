//! Per-connection pending-output buffering.
//!
//! Every live connection owns exactly one [`OutboundQueue`]. Broadcast
//! fan-out appends to it, and the event loop drains it when the connection
//! reports write-readiness. A flush makes a single write attempt: a short
//! write keeps exactly the unsent suffix queued for the next writable cycle
//! instead of retrying in a loop, so one slow consumer can never stall the
//! event loop.

use std::io::{ErrorKind, Write};

/// Outcome of a single flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushProgress {
    /// Everything queued was accepted; the queue is empty again.
    Flushed,
    /// Some or none of the queued bytes were accepted; the rest stays queued.
    Partial,
    /// The peer is unreachable. The connection must be dropped.
    Closed,
}

/// Append-amortized byte queue exclusively owned by one connection.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    buf: Vec<u8>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Whether any bytes are waiting to be sent.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of bytes waiting to be sent.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Appends bytes behind whatever is already queued.
    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Makes one write attempt for the whole queued run.
    ///
    /// `WouldBlock` and `Interrupted` count as zero-progress writes, not
    /// failures: the queue is untouched and the next writable cycle retries.
    /// A write of zero bytes or any other I/O error means the peer is gone.
    pub fn flush<W: Write>(&mut self, writer: &mut W) -> FlushProgress {
        if self.buf.is_empty() {
            return FlushProgress::Flushed;
        }

        match writer.write(&self.buf) {
            Ok(0) => FlushProgress::Closed,
            Ok(sent) if sent >= self.buf.len() => {
                // Release the storage outright; the queue must not linger as
                // an empty-but-allocated buffer once fully flushed.
                self.buf = Vec::new();
                FlushProgress::Flushed
            }
            Ok(sent) => {
                self.buf.drain(..sent);
                FlushProgress::Partial
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => FlushProgress::Partial,
            Err(err) if err.kind() == ErrorKind::Interrupted => FlushProgress::Partial,
            Err(_) => FlushProgress::Closed,
        }
    }
}
