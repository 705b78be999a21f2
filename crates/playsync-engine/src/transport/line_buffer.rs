//! Append-only line buffer fed by a relay process.

use bytes::{Buf, BytesMut};
use playsync_proto::constants::LINE_TERMINATOR;

/// Longest run of bytes without a terminator we keep around.
pub const MAX_PENDING: usize = 64 * 1024;

/// Side buffer between a relay listener's stdout and the poll loop.
///
/// The writer appends raw output; the reader pops complete lines. Consumed
/// bytes are dropped from the front and counted in a monotonic cursor, so a
/// line is never handed out twice.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    cursor: u64,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw relay output.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        if self.buf.len() > MAX_PENDING && !self.buf.contains(&LINE_TERMINATOR) {
            // Nothing decodable can come out of this; start over.
            self.cursor += self.buf.len() as u64;
            self.buf.clear();
        }
    }

    /// Pop the next complete line, terminator stripped.
    ///
    /// A trailing partial line stays buffered until its terminator arrives.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == LINE_TERMINATOR)?;
        let line = self.buf.split_to(end).to_vec();
        self.buf.advance(1);
        self.cursor += end as u64 + 1;
        Some(line)
    }

    /// Total bytes consumed so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_complete_lines_in_order() {
        let mut b = LineBuffer::new();
        b.append(b"play\nposition|1.5\n");
        assert_eq!(b.next_line(), Some(b"play".to_vec()));
        assert_eq!(b.next_line(), Some(b"position|1.5".to_vec()));
        assert_eq!(b.next_line(), None);
        assert_eq!(b.cursor(), 18);
    }

    #[test]
    fn partial_line_waits_for_terminator() {
        let mut b = LineBuffer::new();
        b.append(b"posi");
        assert_eq!(b.next_line(), None);
        assert_eq!(b.pending(), 4);

        b.append(b"tion|3\nsee");
        assert_eq!(b.next_line(), Some(b"position|3".to_vec()));
        assert_eq!(b.next_line(), None);
        assert_eq!(b.cursor(), 11);
        assert_eq!(b.pending(), 3);
    }

    #[test]
    fn consumed_lines_are_never_replayed() {
        let mut b = LineBuffer::new();
        b.append(b"pause\n");
        assert_eq!(b.next_line(), Some(b"pause".to_vec()));
        b.append(b"play\n");
        assert_eq!(b.next_line(), Some(b"play".to_vec()));
        assert_eq!(b.next_line(), None);
    }

    #[test]
    fn empty_lines_come_through_as_empty() {
        let mut b = LineBuffer::new();
        b.append(b"\n\nplay\n");
        assert_eq!(b.next_line(), Some(Vec::new()));
        assert_eq!(b.next_line(), Some(Vec::new()));
        assert_eq!(b.next_line(), Some(b"play".to_vec()));
    }

    #[test]
    fn runaway_garbage_is_discarded() {
        let mut b = LineBuffer::new();
        b.append(&vec![b'x'; MAX_PENDING + 1]);
        assert_eq!(b.pending(), 0);
        assert_eq!(b.cursor(), MAX_PENDING as u64 + 1);

        b.append(b"play\n");
        assert_eq!(b.next_line(), Some(b"play".to_vec()));
    }
}
