//! Flush semantics of the per-connection outbound queue.

use relaycast::{FlushProgress, OutboundQueue};
use std::io::{self, Write};

/// Writer that accepts at most `cap` bytes per call and records everything
/// it accepted.
struct ThrottledWriter {
    accepted: Vec<u8>,
    cap: usize,
    calls: usize,
}

impl ThrottledWriter {
    fn new(cap: usize) -> Self {
        Self {
            accepted: Vec::new(),
            cap,
            calls: 0,
        }
    }
}

impl Write for ThrottledWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.calls += 1;
        let n = buf.len().min(self.cap);
        self.accepted.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that always fails with the given error kind.
struct FailingWriter(io::ErrorKind);

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(self.0, "injected failure"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn full_flush_clears_queue() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"hello");
    let mut writer = ThrottledWriter::new(64);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Flushed);
    assert_eq!(writer.accepted, b"hello");
    assert!(queue.is_empty());
}

#[test]
fn partial_flush_preserves_unsent_suffix() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"abcdefgh");
    let mut writer = ThrottledWriter::new(3);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Partial);
    assert_eq!(writer.accepted, b"abc");
    assert_eq!(queue.len(), 5);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Partial);
    assert_eq!(queue.flush(&mut writer), FlushProgress::Flushed);

    // Delivered across three flushes with no duplication or loss.
    assert_eq!(writer.accepted, b"abcdefgh");
    assert!(queue.is_empty());
}

#[test]
fn flush_makes_exactly_one_write_attempt() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"abcdef");
    let mut writer = ThrottledWriter::new(1);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Partial);
    assert_eq!(writer.calls, 1);
    assert_eq!(queue.len(), 5);
}

#[test]
fn enqueue_appends_in_fifo_order() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"one");
    queue.enqueue(b"two");
    let mut writer = ThrottledWriter::new(64);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Flushed);
    assert_eq!(writer.accepted, b"onetwo");
}

#[test]
fn zero_byte_write_means_peer_gone() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"data");
    let mut writer = ThrottledWriter::new(0);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Closed);
}

#[test]
fn would_block_defers_without_loss() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"payload");

    assert_eq!(
        queue.flush(&mut FailingWriter(io::ErrorKind::WouldBlock)),
        FlushProgress::Partial
    );
    assert_eq!(
        queue.flush(&mut FailingWriter(io::ErrorKind::Interrupted)),
        FlushProgress::Partial
    );

    let mut writer = ThrottledWriter::new(64);
    assert_eq!(queue.flush(&mut writer), FlushProgress::Flushed);
    assert_eq!(writer.accepted, b"payload");
}

#[test]
fn hard_error_means_peer_gone() {
    let mut queue = OutboundQueue::new();
    queue.enqueue(b"data");

    assert_eq!(
        queue.flush(&mut FailingWriter(io::ErrorKind::BrokenPipe)),
        FlushProgress::Closed
    );
}

#[test]
fn empty_queue_flushes_without_touching_the_writer() {
    let mut queue = OutboundQueue::new();
    // Would report Closed if it were written to.
    let mut writer = ThrottledWriter::new(0);

    assert_eq!(queue.flush(&mut writer), FlushProgress::Flushed);
    assert_eq!(writer.calls, 0);
}
