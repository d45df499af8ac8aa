use thiserror::Error;

use transport::{MsgKind, TransportError, Word};

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("expected {expected:?}, peer answered with kind code {got}")]
    WrongAck { expected: MsgKind, got: Word },

    #[error("unknown message kind code {0}")]
    UnknownKind(Word),

    #[error("{0:?} arrived where a request was expected")]
    NotARequest(MsgKind),

    #[error("receive buffer underrun: wanted {wanted} bytes, {available} left")]
    Underrun { wanted: usize, available: usize },

    #[error("{remaining} unconsumed bytes after {kind:?}")]
    TrailingBytes { kind: MsgKind, remaining: usize },

    #[error("operand {0:#x} does not fit a host length")]
    LengthOverflow(Word),

    #[error("invalid address window [{begin:#x}, {end:#x})")]
    InvalidWindow { begin: usize, end: usize },
}

impl ProtocolError {
    /// Framing is out of step with the peer. Nothing on the wire allows recovery.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::WrongAck { .. }
                | ProtocolError::UnknownKind(_)
                | ProtocolError::NotARequest(_)
                | ProtocolError::Underrun { .. }
                | ProtocolError::TrailingBytes { .. }
                | ProtocolError::LengthOverflow(_)
        )
    }
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Underrun { wanted, available } => {
                ProtocolError::Underrun { wanted, available }
            }
            other => ProtocolError::Transport(other),
        }
    }
}
