//! End-to-end suite: a window server, node coordinators and the remote-call
//! dispatcher talking over loopback TCP inside one process.

#[cfg(all(test, unix))]
mod support;

#[cfg(all(test, unix))]
mod window_e2e;

#[cfg(all(test, unix))]
mod demand_fetch;

#[cfg(all(test, unix))]
mod remote_call_e2e;
