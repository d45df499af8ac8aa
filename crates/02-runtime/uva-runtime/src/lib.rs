#![warn(missing_docs)]
//! Node-side runtime for a shared address window.
//!
//! A [`UvaCoordinator`] owns one connection to the window server. It services
//! page faults inside the accepted bounds, fetches the window's canonical bytes
//! the first time any window address faults, and offers explicit remote
//! load/store/bulk operations for call sites that bypass the trap. The
//! [`handshake`] module orders startup across nodes.

mod config;
mod context;
mod coordinator;
mod error;
pub mod fault;
pub mod handshake;
mod window;

pub use config::{NodeRole, PeerAddress, RuntimeConfig};
pub use context::RuntimeContext;
pub use coordinator::{CoordinatorState, UvaCoordinator};
pub use error::{UvaError, UvaResult};
pub use fault::{FaultInterceptor, FaultOutcome, FaultStats, PageMapper};
pub use window::{AcceptedBounds, FaultEvent, DEFAULT_ACCEPTED_BEGIN, DEFAULT_ACCEPTED_END};

/// Re-exported so callers can build windows without naming the protocol crate.
pub use uva_protocol::AddressWindow;
