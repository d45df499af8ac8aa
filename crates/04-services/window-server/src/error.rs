use std::io;

use thiserror::Error;
use transport::TransportError;
use uva_protocol::ProtocolError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("[{addr:#x}, +{len:#x}) lies outside the served ranges")]
    OutOfRange { addr: usize, len: usize },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("image of {len} bytes does not fit the {window} byte window")]
    ImageTooLarge { len: usize, window: usize },

    #[error("invalid server configuration: {0}")]
    Config(String),
}
