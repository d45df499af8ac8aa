use std::net::TcpStream;
use std::ptr;
use std::sync::Arc;

use tracing::{debug, info};
use transport::{Endpoint, QueueSocket};
use uva_protocol::{Ack, AddressWindow, Channel, Request};

use crate::config::{NodeRole, RuntimeConfig};
use crate::context::RuntimeContext;
use crate::error::{UvaError, UvaResult};
use crate::fault::{FaultOutcome, FaultStats, PageMapper};
use crate::handshake::GateOutcome;
use crate::window::AcceptedBounds;

/// Lifecycle of a coordinator. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoordinatorState {
    /// No connection yet.
    Uninitialized,
    /// Connected, interceptor installed, startup gate not yet passed.
    Connected,
    /// Startup gate passed.
    Started,
    /// Init-complete barrier passed.
    Running,
    /// Disconnected; every operation but `finalize` fails.
    Finalized,
}

impl CoordinatorState {
    fn is_live(self) -> bool {
        matches!(
            self,
            CoordinatorState::Connected | CoordinatorState::Started | CoordinatorState::Running
        )
    }
}

/// Node-side owner of the shared window and its connection.
pub struct UvaCoordinator<S: Endpoint = TcpStream> {
    context: Arc<RuntimeContext<S>>,
    #[cfg(unix)]
    interceptor: Option<crate::fault::posix::InterceptorGuard>,
}

#[cfg(unix)]
impl UvaCoordinator<TcpStream> {
    /// Connects to `config.peer` and routes access violations through the POSIX interceptor.
    ///
    /// # Safety
    ///
    /// The window and accepted ranges must belong to this runtime: either
    /// unmapped, so faults there are serviced here, or memory that stays valid
    /// and otherwise unused for the coordinator's lifetime. Fault servicing
    /// writes to those addresses directly.
    pub unsafe fn initialize(config: &RuntimeConfig) -> UvaResult<Self> {
        let mapper = Arc::new(crate::fault::posix::PosixPageMapper::new());
        // SAFETY: forwarded from the caller.
        let mut coordinator = unsafe { Self::connect(config, mapper)? };
        coordinator.install_interceptor()?;
        Ok(coordinator)
    }
}

impl UvaCoordinator<TcpStream> {
    /// Connects without installing an OS handler. Faults are fed through
    /// [`handle_fault`](Self::handle_fault).
    ///
    /// # Safety
    ///
    /// Same contract as [`initialize`](Self::initialize).
    pub unsafe fn connect(config: &RuntimeConfig, mapper: Arc<dyn PageMapper>) -> UvaResult<Self> {
        let socket = QueueSocket::connect(&config.peer.host, config.peer.port, config.transport.clone())
            .map_err(|source| UvaError::Connection {
                peer: config.peer.to_string(),
                source,
            })?;
        // SAFETY: forwarded from the caller.
        unsafe { Self::from_channel(Channel::new(socket), config.window, config.accepted.clone(), mapper) }
    }
}

impl<S: Endpoint> UvaCoordinator<S> {
    /// Wraps an established channel. The coordinator starts in `Connected`.
    ///
    /// # Safety
    ///
    /// Same contract as [`UvaCoordinator::initialize`].
    pub unsafe fn from_channel(
        channel: Channel<S>,
        window: AddressWindow,
        accepted: AcceptedBounds,
        mapper: Arc<dyn PageMapper>,
    ) -> UvaResult<Self> {
        let context = RuntimeContext::new(channel, window, accepted, mapper)?;
        info!(
            begin = format_args!("{:#x}", window.begin()),
            end = format_args!("{:#x}", window.end()),
            "coordinator connected"
        );
        Ok(Self {
            context: Arc::new(context),
            #[cfg(unix)]
            interceptor: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CoordinatorState {
        *self.context.state.lock()
    }

    /// The shared window.
    pub fn window(&self) -> AddressWindow {
        self.context.window()
    }

    /// Shared runtime state, as seen by the fault handler.
    pub fn context(&self) -> &Arc<RuntimeContext<S>> {
        &self.context
    }

    /// Mapping and fetch counters.
    pub fn stats(&self) -> FaultStats {
        self.context.stats()
    }

    /// Services an access violation at `addr`, exactly as the installed handler would.
    pub fn handle_fault(&self, addr: usize) -> UvaResult<FaultOutcome> {
        self.require_live("handle_fault")?;
        self.context.service_fault(addr)
    }

    /// Passes the startup gate for `role`. See [`StartupGate::pass`](crate::handshake::StartupGate::pass).
    pub fn startup_gate(&self, role: NodeRole) -> UvaResult<GateOutcome> {
        self.require_live("startup_gate")?;
        let outcome = self
            .context
            .check(self.context.startup.pass(role, self.context.channel()))?;
        self.advance(CoordinatorState::Connected, CoordinatorState::Started);
        Ok(outcome)
    }

    /// Signals that local global construction finished and waits for the ack.
    pub fn complete_init(&self) -> UvaResult<GateOutcome> {
        let state = self.state();
        if !matches!(state, CoordinatorState::Started | CoordinatorState::Running) {
            return Err(UvaError::InvalidState {
                op: "complete_init",
                state,
            });
        }
        let outcome = self
            .context
            .check(self.context.init.complete(self.context.channel()))?;
        self.advance(CoordinatorState::Started, CoordinatorState::Running);
        Ok(outcome)
    }

    /// Reads `len` bytes of the server's copy at `addr`.
    pub fn load(&self, addr: usize, len: usize) -> UvaResult<Vec<u8>> {
        match self.exchange("load", &Request::Load { addr, len })? {
            Ack::Load { bytes } => Ok(bytes),
            other => unreachable!("decode_for pairs the ack with its request, got {other:?}"),
        }
    }

    /// Reads `len` bytes of the server's copy at `addr` into the same local addresses.
    ///
    /// The connection lock is released before the copy, so a fault raised by
    /// the copy is serviced on this thread without deadlocking.
    ///
    /// # Safety
    ///
    /// `[addr, addr + len)` must be writable local memory or lie in the
    /// accepted bounds with an interceptor installed.
    pub unsafe fn load_into(&self, addr: usize, len: usize) -> UvaResult<()> {
        let bytes = self.load(addr, len)?;
        // SAFETY: guaranteed by the caller.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len()) };
        Ok(())
    }

    /// Writes `bytes` into the server's copy at `addr`.
    pub fn store(&self, addr: usize, bytes: &[u8]) -> UvaResult<()> {
        // Copied before the connection lock is taken: reading `bytes` may fault.
        let request = Request::Store {
            addr,
            bytes: bytes.to_vec(),
        };
        self.exchange("store", &request).map(drop)
    }

    /// Fills `len` bytes at `addr` with `value` on the server.
    pub fn memset_remote(&self, addr: usize, value: u8, len: usize) -> UvaResult<()> {
        self.exchange("memset_remote", &Request::Memset { addr, value, len })
            .map(drop)
    }

    /// Copies `len` bytes from `src` to `dest` on the server. Ranges must not overlap.
    pub fn memcpy_remote(&self, dest: usize, src: usize, len: usize) -> UvaResult<()> {
        self.exchange("memcpy_remote", &Request::Memcpy { dest, src, len })
            .map(drop)
    }

    /// Moves `len` bytes from `src` to `dest` on the server, tolerating overlap.
    pub fn memmove_remote(&self, dest: usize, src: usize, len: usize) -> UvaResult<()> {
        self.exchange("memmove_remote", &Request::Memmove { dest, src, len })
            .map(drop)
    }

    /// Allocates `size` bytes from the server's heap. Returns 0 when it is exhausted.
    pub fn heap_alloc(&self, size: usize) -> UvaResult<usize> {
        match self.exchange("heap_alloc", &Request::HeapAlloc { size })? {
            Ack::HeapAlloc { addr } => Ok(addr),
            other => unreachable!("decode_for pairs the ack with its request, got {other:?}"),
        }
    }

    /// Zero-fills `len` bytes at `addr` on the server and returns the address.
    pub fn mmap_remote(&self, addr: usize, len: usize) -> UvaResult<usize> {
        match self.exchange("mmap_remote", &Request::Mmap { addr, len })? {
            Ack::Mmap { addr } => Ok(addr),
            other => unreachable!("decode_for pairs the ack with its request, got {other:?}"),
        }
    }

    /// Dumps the window head, removes the interceptor and disconnects. Idempotent.
    pub fn finalize(&mut self) -> UvaResult<()> {
        {
            let mut state = self.context.state.lock();
            if *state == CoordinatorState::Finalized {
                // Abandoned after a violation; the handler may still be installed.
                #[cfg(unix)]
                self.interceptor.take();
                return Ok(());
            }
            *state = CoordinatorState::Finalized;
        }
        self.context.dump_window();
        #[cfg(unix)]
        self.interceptor.take();
        self.context.channel().disconnect();
        info!(stats = ?self.context.stats(), "coordinator finalized");
        Ok(())
    }

    fn exchange(&self, op: &'static str, request: &Request) -> UvaResult<Ack> {
        self.require_live(op)?;
        let result = self.context.channel().exchange(request).map_err(UvaError::from);
        let ack = self.context.check(result)?;
        debug!(op, "remote operation complete");
        Ok(ack)
    }

    fn require_live(&self, op: &'static str) -> UvaResult<()> {
        let state = self.state();
        if state.is_live() {
            Ok(())
        } else {
            Err(UvaError::InvalidState { op, state })
        }
    }

    fn advance(&self, from: CoordinatorState, to: CoordinatorState) {
        let mut state = self.context.state.lock();
        if *state == from {
            info!(?from, ?to, "coordinator state");
            *state = to;
        }
    }
}

#[cfg(unix)]
impl<S: Endpoint + Send + 'static> UvaCoordinator<S> {
    /// Routes every access violation in the process to this coordinator until finalize.
    pub fn install_interceptor(&mut self) -> UvaResult<()> {
        if self.interceptor.is_none() {
            let interceptor = Arc::clone(&self.context) as Arc<dyn crate::fault::FaultInterceptor>;
            self.interceptor = Some(crate::fault::posix::install_interceptor(interceptor)?);
        }
        Ok(())
    }
}

impl<S: Endpoint> Drop for UvaCoordinator<S> {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}
