use transport::{Endpoint, QueueSocket, RecvQueue, SendQueue, TransportResult, Word};

use crate::error::{ProtocolError, ProtocolResult};

/// Anything operands can be pushed onto.
pub trait WordSink {
    fn push_word(&mut self, word: Word);
    fn push_range(&mut self, bytes: &[u8]);
}

/// Anything operands can be taken from, in push order.
pub trait WordSource {
    fn take_word(&mut self) -> TransportResult<Word>;
    fn take_range(&mut self, len: usize) -> TransportResult<&[u8]>;
    fn remaining(&self) -> usize;

    /// Takes a word that names a host length or address.
    fn take_usize(&mut self) -> ProtocolResult<usize> {
        let word = self.take_word()?;
        usize::try_from(word).map_err(|_| ProtocolError::LengthOverflow(word))
    }
}

impl WordSink for SendQueue {
    fn push_word(&mut self, word: Word) {
        SendQueue::push_word(self, word);
    }

    fn push_range(&mut self, bytes: &[u8]) {
        SendQueue::push_range(self, bytes);
    }
}

impl WordSource for RecvQueue {
    fn take_word(&mut self) -> TransportResult<Word> {
        RecvQueue::take_word(self)
    }

    fn take_range(&mut self, len: usize) -> TransportResult<&[u8]> {
        RecvQueue::take_range(self, len)
    }

    fn remaining(&self) -> usize {
        RecvQueue::remaining(self)
    }
}

impl<S: Endpoint> WordSink for QueueSocket<S> {
    fn push_word(&mut self, word: Word) {
        QueueSocket::push_word(self, word);
    }

    fn push_range(&mut self, bytes: &[u8]) {
        QueueSocket::push_range(self, bytes);
    }
}

impl<S: Endpoint> WordSource for QueueSocket<S> {
    fn take_word(&mut self) -> TransportResult<Word> {
        QueueSocket::take_word(self)
    }

    fn take_range(&mut self, len: usize) -> TransportResult<&[u8]> {
        QueueSocket::take_range(self, len)
    }

    fn remaining(&self) -> usize {
        QueueSocket::remaining(self)
    }
}
