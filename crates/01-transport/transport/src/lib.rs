//! Word-queue transport shared by every node and the window server.
//!
//! The crate exposes the one primitive the rest of the workspace builds on:
//! * [`QueueSocket`] – a stage-then-flush channel. Words and raw byte ranges are
//!   pushed into an outgoing queue and leave the process as one framed unit.
//! * [`SendQueue`] / [`RecvQueue`] – the staging and receive buffers on their own,
//!   usable without a stream for encoding tests.
//! * [`MsgKind`] – the request/ack code table carried in the first word of every unit.
//! * [`TransportError`] – failure surface for stream I/O and buffer underruns.
//!
//! Both ends must mirror push/take order exactly. Nothing on the wire says where
//! one operand ends and the next begins.

mod config;
mod endpoint;
mod error;
mod queue;
pub mod schema;
mod socket;

pub use config::{TransportConfig, DEFAULT_MAX_FRAME_BYTES};
pub use endpoint::Endpoint;
pub use error::{TransportError, TransportResult};
pub use queue::{RecvQueue, SendQueue, Word, FRAME_HEADER_BYTES, WORD_BYTES};
pub use schema::{MsgKind, START_DENIED, START_PERMITTED};
pub use socket::QueueSocket;
