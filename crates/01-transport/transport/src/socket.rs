use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};
use crate::queue::{RecvQueue, SendQueue, Word, FRAME_HEADER_BYTES};

/// Stage-then-flush channel between two endpoints.
///
/// `push_*` calls only touch the staging buffer. [`send_queue`](Self::send_queue)
/// writes the staged bytes as one unit, and [`receive_queue`](Self::receive_queue)
/// blocks until one whole unit from the peer is buffered for the `take_*` calls.
pub struct QueueSocket<S = TcpStream> {
    stream: Option<S>,
    outgoing: SendQueue,
    incoming: RecvQueue,
    config: TransportConfig,
}

impl QueueSocket<TcpStream> {
    /// Opens a TCP connection to `host:port`.
    pub fn connect(host: &str, port: u16, config: TransportConfig) -> TransportResult<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port)).map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
        debug!(%addr, "connected");
        Self::from_stream(stream, config)
    }

    /// Blocks for the next connection on `listener`.
    pub fn accept(listener: &TcpListener, config: TransportConfig) -> TransportResult<(Self, SocketAddr)> {
        let (stream, peer) = listener.accept()?;
        debug!(%peer, "accepted");
        Ok((Self::from_stream(stream, config)?, peer))
    }
}

#[cfg(unix)]
impl QueueSocket<UnixStream> {
    /// Two connected sockets in one process.
    pub fn pair(config: TransportConfig) -> TransportResult<(Self, Self)> {
        let (a, b) = UnixStream::pair()?;
        Ok((
            Self::from_stream(a, config.clone())?,
            Self::from_stream(b, config)?,
        ))
    }
}

impl<S: Endpoint> QueueSocket<S> {
    pub fn from_stream(stream: S, config: TransportConfig) -> TransportResult<Self> {
        stream.configure(&config)?;
        Ok(Self {
            stream: Some(stream),
            outgoing: SendQueue::new(),
            incoming: RecvQueue::new(),
            config,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn push_word(&mut self, word: Word) {
        self.outgoing.push_word(word);
    }

    pub fn push_range(&mut self, bytes: &[u8]) {
        self.outgoing.push_range(bytes);
    }

    /// Bytes staged but not yet flushed.
    pub fn staged(&self) -> usize {
        self.outgoing.len()
    }

    /// Flushes the staging buffer as one unit. The buffer is cleared whether or not the write succeeds.
    pub fn send_queue(&mut self) -> TransportResult<()> {
        let Self {
            stream,
            outgoing,
            config,
            ..
        } = self;
        let len = outgoing.len();
        if len > config.max_frame_bytes {
            outgoing.clear();
            return Err(TransportError::FrameTooLarge {
                len,
                max: config.max_frame_bytes,
            });
        }
        let Some(stream) = stream.as_mut() else {
            outgoing.clear();
            return Err(TransportError::Disconnected);
        };
        let result = stream
            .write_all(outgoing.frame())
            .and_then(|()| stream.flush());
        outgoing.clear();
        result.map_err(TransportError::from_io)?;
        trace!(bytes = len, "sent unit");
        Ok(())
    }

    /// Blocks until one complete unit is buffered. Unconsumed bytes of the previous unit are dropped.
    ///
    /// On failure the receive buffer is left empty, so no partial unit can be taken.
    pub fn receive_queue(&mut self) -> TransportResult<()> {
        let Self {
            stream,
            incoming,
            config,
            ..
        } = self;
        let stream = stream.as_mut().ok_or(TransportError::Disconnected)?;
        match read_unit(stream, incoming, config.max_frame_bytes) {
            Ok(len) => {
                trace!(bytes = len, "received unit");
                Ok(())
            }
            Err(err) => {
                incoming.reset(0);
                Err(err)
            }
        }
    }

    pub fn take_word(&mut self) -> TransportResult<Word> {
        self.incoming.take_word()
    }

    pub fn take_range(&mut self, len: usize) -> TransportResult<&[u8]> {
        self.incoming.take_range(len)
    }

    pub fn take_range_into(&mut self, dst: &mut [u8]) -> TransportResult<()> {
        self.incoming.take_range_into(dst)
    }

    /// Bytes of the current unit not yet taken.
    pub fn remaining(&self) -> usize {
        self.incoming.remaining()
    }

    /// Closes the stream. Calling it again is a no-op.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.close();
            self.outgoing.clear();
            debug!("disconnected");
        }
    }
}

fn read_unit<S: Read>(stream: &mut S, incoming: &mut RecvQueue, max: usize) -> TransportResult<usize> {
    let mut header = [0u8; FRAME_HEADER_BYTES];
    stream.read_exact(&mut header).map_err(TransportError::from_io)?;
    let len = u64::from_le_bytes(header);
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= max)
        .ok_or(TransportError::FrameTooLarge {
            len: usize::try_from(len).unwrap_or(usize::MAX),
            max,
        })?;
    stream
        .read_exact(incoming.reset(len))
        .map_err(TransportError::from_io)?;
    Ok(len)
}
