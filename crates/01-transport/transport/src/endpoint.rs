use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::config::TransportConfig;

/// Byte stream a [`QueueSocket`](crate::QueueSocket) can run over.
///
/// Implemented for TCP streams (the production path) and, on unix, for
/// `UnixStream` so in-process peers can be wired up with `UnixStream::pair()`.
pub trait Endpoint: Read + Write {
    /// Applies timeouts and stream options from `config`.
    fn configure(&self, config: &TransportConfig) -> io::Result<()>;

    /// Shuts down both directions. Errors from an already-closed stream are ignored by callers.
    fn close(&self) -> io::Result<()>;
}

impl Endpoint for TcpStream {
    fn configure(&self, config: &TransportConfig) -> io::Result<()> {
        self.set_nodelay(config.nodelay)?;
        self.set_read_timeout(config.io_timeout)?;
        self.set_write_timeout(config.io_timeout)
    }

    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl Endpoint for UnixStream {
    fn configure(&self, config: &TransportConfig) -> io::Result<()> {
        self.set_read_timeout(config.io_timeout)?;
        self.set_write_timeout(config.io_timeout)
    }

    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}
