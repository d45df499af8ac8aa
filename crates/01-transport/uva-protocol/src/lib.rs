#![allow(missing_docs)]
//! Typed request/ack pairs over the word-queue transport.
//!
//! [`Request`] and [`Ack`] know how to push and take their operands, and
//! [`Channel`] serializes whole exchanges on one connection so a multi-threaded
//! host never interleaves two requests on the wire.

mod channel;
mod codec;
mod error;
mod message;
mod window;

pub use channel::Channel;
pub use codec::{WordSink, WordSource};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Ack, Request};
pub use window::AddressWindow;
