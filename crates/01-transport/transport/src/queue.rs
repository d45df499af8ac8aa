//! Staging and receive buffers behind a [`QueueSocket`](crate::QueueSocket).
//!
//! A unit on the wire is `[u64 LE payload length][payload]`. The staging buffer
//! reserves the header up front so a flush is a single contiguous write.

use crate::error::{TransportError, TransportResult};

/// Fixed-size unit pushed onto the queue.
pub type Word = u64;

/// Encoded size of one [`Word`].
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

/// Length prefix in front of every unit.
pub const FRAME_HEADER_BYTES: usize = std::mem::size_of::<u64>();

/// Outgoing staging buffer. Nothing leaves the process until the owning socket flushes.
#[derive(Debug, Clone)]
pub struct SendQueue {
    buf: Vec<u8>,
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SendQueue {
    pub fn new() -> Self {
        Self {
            buf: vec![0; FRAME_HEADER_BYTES],
        }
    }

    pub fn push_word(&mut self, word: Word) {
        self.buf.extend_from_slice(&word.to_le_bytes());
    }

    /// Appends raw bytes with no length prefix.
    pub fn push_range(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Staged payload length, excluding the frame header.
    pub fn len(&self) -> usize {
        self.buf.len() - FRAME_HEADER_BYTES
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[FRAME_HEADER_BYTES..]
    }

    /// Drops everything staged since the last flush.
    pub fn clear(&mut self) {
        self.buf.truncate(FRAME_HEADER_BYTES);
    }

    /// Writes the length prefix and returns the whole unit ready for the stream.
    pub(crate) fn frame(&mut self) -> &[u8] {
        let len = self.len() as u64;
        self.buf[..FRAME_HEADER_BYTES].copy_from_slice(&len.to_le_bytes());
        &self.buf
    }
}

/// Received unit plus a read cursor.
#[derive(Debug, Default, Clone)]
pub struct RecvQueue {
    buf: Vec<u8>,
    cursor: usize,
}

impl RecvQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already received payload.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        Self {
            buf: payload,
            cursor: 0,
        }
    }

    pub fn take_word(&mut self) -> TransportResult<Word> {
        let mut raw = [0u8; WORD_BYTES];
        raw.copy_from_slice(self.take_range(WORD_BYTES)?);
        Ok(Word::from_le_bytes(raw))
    }

    /// Borrows the next `len` bytes of the unit.
    pub fn take_range(&mut self, len: usize) -> TransportResult<&[u8]> {
        let available = self.remaining();
        if len > available {
            return Err(TransportError::Underrun {
                wanted: len,
                available,
            });
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.buf[start..self.cursor])
    }

    /// Copies the next `dst.len()` bytes of the unit into `dst`.
    pub fn take_range_into(&mut self, dst: &mut [u8]) -> TransportResult<()> {
        let src = self.take_range(dst.len())?;
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Bytes not yet consumed from the current unit.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// Discards the previous unit and hands out a zeroed buffer of `len` bytes to fill.
    pub(crate) fn reset(&mut self, len: usize) -> &mut [u8] {
        self.cursor = 0;
        self.buf.clear();
        self.buf.resize(len, 0);
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_carries_payload_length() {
        let mut queue = SendQueue::new();
        queue.push_word(7);
        queue.push_range(&[1, 2, 3]);
        let frame = queue.frame().to_vec();
        assert_eq!(&frame[..8], &11u64.to_le_bytes());
        assert_eq!(&frame[8..16], &7u64.to_le_bytes());
        assert_eq!(&frame[16..], &[1, 2, 3]);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.frame(), &0u64.to_le_bytes());
    }

    #[test]
    fn takes_follow_push_order() {
        let mut send = SendQueue::new();
        send.push_word(u64::MAX);
        send.push_range(b"window");
        send.push_word(0);

        let mut recv = RecvQueue::from_payload(send.payload().to_vec());
        assert_eq!(recv.take_word().unwrap(), u64::MAX);
        assert_eq!(recv.take_range(6).unwrap(), b"window");
        assert_eq!(recv.take_word().unwrap(), 0);
        assert_eq!(recv.remaining(), 0);
    }

    #[test]
    fn underrun_reports_shortfall() {
        let mut recv = RecvQueue::from_payload(vec![0; 5]);
        match recv.take_word() {
            Err(TransportError::Underrun { wanted, available }) => {
                assert_eq!(wanted, 8);
                assert_eq!(available, 5);
            }
            other => panic!("expected underrun, got {other:?}"),
        }
        // A failed take consumes nothing.
        assert_eq!(recv.remaining(), 5);
    }

    #[test]
    fn reset_discards_unconsumed_bytes() {
        let mut recv = RecvQueue::from_payload(vec![9; 16]);
        recv.take_word().unwrap();
        let buf = recv.reset(4);
        buf.copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(recv.remaining(), 4);
        let mut out = [0u8; 4];
        recv.take_range_into(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }
}
