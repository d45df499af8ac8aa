use std::io;

use thiserror::Error;
use transport::{TransportError, Word};
use uva_protocol::ProtocolError;

use crate::coordinator::CoordinatorState;

/// Result alias for runtime operations.
pub type UvaResult<T> = Result<T, UvaError>;

/// Every failure the runtime reports. All of them are fatal to the node.
#[derive(Debug, Error)]
pub enum UvaError {
    /// Setting up the connection to the window server failed.
    #[error("failed to connect to {peer}: {source}")]
    Connection {
        /// `host:port` that was dialled.
        peer: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The peer answered out of step. There is no resynchronization.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[source] ProtocolError),

    /// Stream failure after the connection was established.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// Protocol-layer failure that is not a framing violation.
    #[error("protocol error: {0}")]
    Protocol(#[source] ProtocolError),

    /// The startup token was anything but "permitted".
    #[error("startup permission denied (token {token})")]
    PermissionDenied {
        /// Token received from the window server.
        token: Word,
    },

    /// A fault hit an address outside every accepted range.
    #[error("access violation at {addr:#x} outside every accepted region")]
    OutOfBoundsFault {
        /// Faulting address.
        addr: usize,
    },

    /// The operation is not allowed in the coordinator's current state.
    #[error("`{op}` is not allowed while {state:?}")]
    InvalidState {
        /// Operation that was attempted.
        op: &'static str,
        /// State at the time of the call.
        state: CoordinatorState,
    },

    /// Installing a page mapping failed.
    #[error("failed to map page {page:#x}: {source}")]
    MapFailed {
        /// Page start address.
        page: usize,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// Installing or removing the access-violation handler failed.
    #[error("fault interceptor: {0}")]
    Interceptor(#[source] io::Error),

    /// Only one interceptor can own the process-wide handler.
    #[error("a fault interceptor is already installed in this process")]
    InterceptorBusy,

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl UvaError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        UvaError::Config(msg.into())
    }
}

impl From<ProtocolError> for UvaError {
    fn from(err: ProtocolError) -> Self {
        if err.is_violation() {
            return UvaError::ProtocolViolation(err);
        }
        match err {
            ProtocolError::Transport(inner) => UvaError::Transport(inner),
            other => UvaError::Protocol(other),
        }
    }
}

impl From<TransportError> for UvaError {
    fn from(err: TransportError) -> Self {
        UvaError::from(ProtocolError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use transport::MsgKind;

    use super::*;

    #[test]
    fn violations_stay_distinct_from_io() {
        let wrong = ProtocolError::WrongAck {
            expected: MsgKind::LoadAck,
            got: 5,
        };
        assert!(matches!(UvaError::from(wrong), UvaError::ProtocolViolation(_)));

        let underrun = TransportError::Underrun {
            wanted: 8,
            available: 0,
        };
        assert!(matches!(UvaError::from(underrun), UvaError::ProtocolViolation(_)));

        assert!(matches!(
            UvaError::from(TransportError::Closed),
            UvaError::Transport(TransportError::Closed)
        ));
    }
}
