//! Home of the canonical window content.
//!
//! The [`WindowServer`] accepts node connections, gates participants until the
//! initializer signals init completion, and answers every request kind against
//! a [`WindowStore`] addressed by the same virtual addresses the nodes use.

mod config;
mod error;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{ConnectionRole, ServerHandle, WindowServer};
pub use store::{WindowStore, HEAP_ALIGN};
