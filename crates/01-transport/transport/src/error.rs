//! Error handling helpers for the transport crate.

use std::io;

use thiserror::Error;

/// Convenience result alias for fallible transport operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced by the word-queue transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Reading or writing the underlying stream failed.
    #[error("transport i/o failed: {0}")]
    Io(#[from] io::Error),
    /// The configured I/O timeout elapsed while blocked on the peer.
    #[error("timed out waiting for peer")]
    Timeout,
    /// The peer closed the stream while a unit was expected.
    #[error("peer closed the connection")]
    Closed,
    /// The socket was disconnected locally.
    #[error("transport is disconnected")]
    Disconnected,
    /// A unit exceeded the configured frame limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    /// A take ran past the end of the received unit.
    #[error("receive buffer underrun: wanted {wanted} bytes, {available} left")]
    Underrun { wanted: usize, available: usize },
}

impl TransportError {
    /// Classifies a stream error raised while a unit was in flight.
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportError::Closed,
            _ => TransportError::Io(err),
        }
    }

    /// True when the peer is gone rather than misbehaving.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed | TransportError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_stream_errors() {
        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert!(matches!(TransportError::from_io(eof), TransportError::Closed));

        let blocked = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(matches!(TransportError::from_io(blocked), TransportError::Timeout));

        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(TransportError::from_io(other), TransportError::Io(_)));
    }
}
