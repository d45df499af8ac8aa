use std::net::TcpStream;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};
use transport::Endpoint;
use uva_protocol::{Ack, AddressWindow, Channel, Request};

use crate::coordinator::CoordinatorState;
use crate::error::{UvaError, UvaResult};
use crate::fault::{FaultInterceptor, FaultOutcome, FaultStats, PageMapper, PageTable};
use crate::handshake::{InitBarrier, StartupGate};
use crate::window::{AcceptedBounds, FaultEvent};

/// Bytes of the window echoed by the finalize dump.
const DUMP_BYTES: usize = 32;

/// Everything one node shares between its threads and its fault handler.
///
/// Built when a coordinator is created and dropped with it; there is no
/// process-wide connection or manager.
pub struct RuntimeContext<S = TcpStream> {
    channel: Channel<S>,
    window: AddressWindow,
    accepted: AcceptedBounds,
    pages: PageTable,
    window_fetched: Mutex<bool>,
    pub(crate) startup: StartupGate,
    pub(crate) init: InitBarrier,
    pub(crate) state: Mutex<CoordinatorState>,
}

impl<S: Endpoint> RuntimeContext<S> {
    pub(crate) fn new(
        channel: Channel<S>,
        window: AddressWindow,
        accepted: AcceptedBounds,
        mapper: Arc<dyn PageMapper>,
    ) -> UvaResult<Self> {
        if !accepted.covers_window(&window) {
            return Err(UvaError::config(format!(
                "accepted bounds do not cover window [{:#x}, {:#x})",
                window.begin(),
                window.end()
            )));
        }
        Ok(Self {
            channel,
            window,
            accepted,
            pages: PageTable::new(mapper),
            window_fetched: Mutex::new(false),
            startup: StartupGate::new(),
            init: InitBarrier::new(),
            state: Mutex::new(CoordinatorState::Connected),
        })
    }

    /// The shared window.
    pub fn window(&self) -> AddressWindow {
        self.window
    }

    /// Ranges where faults are serviced.
    pub fn accepted(&self) -> &AcceptedBounds {
        &self.accepted
    }

    /// Connection to the window server.
    pub fn channel(&self) -> &Channel<S> {
        &self.channel
    }

    /// Mapping and fetch counters.
    pub fn stats(&self) -> FaultStats {
        self.pages.stats()
    }

    /// Whether the window content has been fetched.
    pub fn window_fetched(&self) -> bool {
        *self.window_fetched.lock()
    }

    /// Validates `addr`, maps its page and, the first time a window address
    /// faults, maps every window page and fetches the canonical content.
    pub fn service_fault(&self, addr: usize) -> UvaResult<FaultOutcome> {
        if !self.accepted.contains(addr) {
            return Err(UvaError::OutOfBoundsFault { addr });
        }
        let event = FaultEvent::new(addr, self.pages.page_size());

        if self.window.contains(addr) {
            let mut fetched = self.window_fetched.lock();
            if !*fetched {
                // The copy below must never fault, so every window page goes in first.
                for page in self.window.pages(self.pages.page_size()) {
                    self.pages.ensure_mapped(page)?;
                }
                self.fetch_window()?;
                *fetched = true;
                return Ok(FaultOutcome::Fetched);
            }
        }

        if self.pages.ensure_mapped(event.page)? {
            Ok(FaultOutcome::Mapped)
        } else {
            Ok(FaultOutcome::AlreadyMapped)
        }
    }

    fn fetch_window(&self) -> UvaResult<()> {
        let request = Request::GlobalSegfault {
            begin: self.window.begin(),
            end: self.window.end(),
        };
        let result = self.channel.exchange(&request).map_err(UvaError::from);
        let bytes = match self.check(result)? {
            Ack::GlobalSegfault { bytes } => bytes,
            other => unreachable!("decode_for pairs the ack with its request, got {other:?}"),
        };
        debug_assert_eq!(bytes.len(), self.window.len());
        // SAFETY: every page covering the window was mapped read/write above and
        // the window belongs to this runtime.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.window.begin() as *mut u8, bytes.len());
        }
        self.pages.record_fetch();
        debug!(
            begin = format_args!("{:#x}", self.window.begin()),
            len = bytes.len(),
            "fetched window"
        );
        Ok(())
    }

    /// Passes `result` through. A protocol violation leaves the wire out of
    /// step for good, so it drops the connection and finalizes the context.
    pub(crate) fn check<T>(&self, result: UvaResult<T>) -> UvaResult<T> {
        if let Err(err @ UvaError::ProtocolViolation(_)) = &result {
            self.abandon(err);
        }
        result
    }

    fn abandon(&self, err: &UvaError) {
        let mut state = self.state.lock();
        if *state != CoordinatorState::Finalized {
            error!(%err, from = ?*state, "connection abandoned");
            *state = CoordinatorState::Finalized;
            self.channel.disconnect();
        }
    }

    /// Logs the leading bytes of the local window copy, if one was fetched.
    pub(crate) fn dump_window(&self) {
        if !self.window_fetched() {
            return;
        }
        let len = self.window.len().min(DUMP_BYTES);
        // SAFETY: a fetched window is fully mapped and stays mapped.
        let head = unsafe { std::slice::from_raw_parts(self.window.begin() as *const u8, len) };
        let hex = head
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(begin = format_args!("{:#x}", self.window.begin()), %hex, "final window state");
    }
}

impl<S: Endpoint + Send> FaultInterceptor for RuntimeContext<S> {
    fn on_fault(&self, addr: usize) -> UvaResult<FaultOutcome> {
        self.service_fault(addr)
    }
}
