use std::net::TcpStream;

use parking_lot::Mutex;
use tracing::debug;
use transport::{Endpoint, QueueSocket, Word};

use crate::error::ProtocolResult;
use crate::message::{Ack, Request};

/// One connection shared by every thread of a node.
///
/// The lock is held across the whole exchange: encode, flush, receive and
/// decode. Holding it per primitive would let two threads interleave their
/// operands on the wire.
pub struct Channel<S = TcpStream> {
    socket: Mutex<QueueSocket<S>>,
}

impl<S: Endpoint> Channel<S> {
    pub fn new(socket: QueueSocket<S>) -> Self {
        Self {
            socket: Mutex::new(socket),
        }
    }

    /// Sends `request` and blocks for its ack. Any other ack kind is a violation.
    pub fn exchange(&self, request: &Request) -> ProtocolResult<Ack> {
        let mut socket = self.socket.lock();
        request.encode(&mut *socket);
        socket.send_queue()?;
        socket.receive_queue()?;
        let ack = Ack::decode_for(request, &mut *socket)?;
        debug!(kind = ?request.kind(), "exchange complete");
        Ok(ack)
    }

    /// Blocks for one unsolicited single-word unit, such as the startup token.
    pub fn receive_word(&self) -> ProtocolResult<Word> {
        let mut socket = self.socket.lock();
        socket.receive_queue()?;
        let word = socket.take_word()?;
        Ok(word)
    }

    pub fn is_connected(&self) -> bool {
        self.socket.lock().is_connected()
    }

    /// Idempotent.
    pub fn disconnect(&self) {
        self.socket.lock().disconnect();
    }
}
