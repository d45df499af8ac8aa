use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};
use transport::{QueueSocket, Word, START_DENIED, START_PERMITTED};
use uva_protocol::{Ack, Request};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::WindowStore;

/// How the server treats a connection, fixed by accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Runs global constructors; receives no startup token.
    Initializer,
    /// Receives a startup token before any request is read.
    Participant,
}

struct GateState {
    accepted: usize,
    initializers_pending: usize,
}

struct Shared {
    config: ServerConfig,
    store: Mutex<WindowStore>,
    gate: Mutex<GateState>,
    gate_open: Condvar,
    stopping: AtomicBool,
}

impl Shared {
    fn assign_role(&self) -> ConnectionRole {
        let mut gate = self.gate.lock();
        let index = gate.accepted;
        gate.accepted += 1;
        if index < self.config.initializers {
            ConnectionRole::Initializer
        } else {
            ConnectionRole::Participant
        }
    }

    /// Blocks until participants may start, unless gating is off.
    fn permission_token(&self) -> Word {
        if self.config.deny_participants {
            return START_DENIED;
        }
        if self.config.gate_participants {
            let mut gate = self.gate.lock();
            while gate.initializers_pending > 0 && !self.stopping.load(Ordering::Acquire) {
                self.gate_open.wait(&mut gate);
            }
        }
        if self.stopping.load(Ordering::Acquire) {
            START_DENIED
        } else {
            START_PERMITTED
        }
    }

    fn initializer_done(&self) {
        let mut gate = self.gate.lock();
        gate.initializers_pending = gate.initializers_pending.saturating_sub(1);
        if gate.initializers_pending == 0 {
            info!("all initializers finished; opening startup gate");
            self.gate_open.notify_all();
        }
    }

    fn apply(&self, request: &Request) -> ServerResult<Ack> {
        let mut store = self.store.lock();
        let ack = match request {
            Request::HeapAlloc { size } => Ack::HeapAlloc {
                addr: store.alloc(*size),
            },
            Request::Load { addr, len } => Ack::Load {
                bytes: store.read(*addr, *len)?.to_vec(),
            },
            Request::Store { addr, bytes } => {
                store.write(*addr, bytes)?;
                Ack::Store
            }
            Request::Mmap { addr, len } => {
                store.fill(*addr, 0, *len)?;
                Ack::Mmap { addr: *addr }
            }
            Request::Memset { addr, value, len } => {
                store.fill(*addr, *value, *len)?;
                Ack::Memset
            }
            Request::Memcpy { dest, src, len } => {
                store.copy(*dest, *src, *len)?;
                Ack::Memcpy
            }
            Request::Memmove { dest, src, len } => {
                store.copy(*dest, *src, *len)?;
                Ack::Memmove
            }
            Request::GlobalSegfault { begin, end } => {
                let len = end.checked_sub(*begin).ok_or(ServerError::OutOfRange {
                    addr: *begin,
                    len: 0,
                })?;
                Ack::GlobalSegfault {
                    bytes: store.read(*begin, len)?.to_vec(),
                }
            }
            Request::GlobalInitComplete => Ack::GlobalInitComplete,
        };
        Ok(ack)
    }
}

/// Accepts node connections and serves each on its own thread.
pub struct WindowServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl WindowServer {
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        let mut store = WindowStore::new(config.window, config.heap)?;
        if let Some(image) = &config.image {
            store.seed(image)?;
        }
        let listener = TcpListener::bind(config.bind)?;
        info!(
            addr = %listener.local_addr()?,
            begin = format_args!("{:#x}", config.window.begin()),
            len = config.window.len(),
            "window server listening"
        );
        let gate = GateState {
            accepted: 0,
            initializers_pending: config.initializers,
        };
        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                config,
                store: Mutex::new(store),
                gate: Mutex::new(gate),
                gate_open: Condvar::new(),
                stopping: AtomicBool::new(false),
            }),
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerResult<ServerHandle> {
        Ok(ServerHandle {
            addr: self.local_addr()?,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Accepts connections until [`ServerHandle::shutdown`] is called.
    pub fn run(self) -> ServerResult<()> {
        let mut next_id = 0usize;
        for stream in self.listener.incoming() {
            if self.shared.stopping.load(Ordering::Acquire) {
                break;
            }
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };
            let role = self.shared.assign_role();
            let shared = Arc::clone(&self.shared);
            let id = next_id;
            next_id += 1;
            thread::Builder::new()
                .name(format!("uva-conn-{id}"))
                .spawn(move || {
                    if let Err(err) = serve_connection(&shared, stream, role) {
                        error!(id, %err, "connection closed on error");
                    }
                })?;
        }
        info!("window server stopped");
        Ok(())
    }

    /// Runs the accept loop on a background thread.
    pub fn spawn(self) -> ServerResult<(ServerHandle, JoinHandle<ServerResult<()>>)> {
        let handle = self.handle()?;
        let join = thread::Builder::new()
            .name("uva-accept".to_owned())
            .spawn(move || self.run())?;
        Ok((handle, join))
    }
}

fn serve_connection(shared: &Shared, stream: TcpStream, role: ConnectionRole) -> ServerResult<()> {
    let peer = stream.peer_addr()?;
    let mut socket = QueueSocket::from_stream(stream, shared.config.transport.clone())?;
    info!(%peer, ?role, "node connected");

    if role == ConnectionRole::Participant {
        let token = shared.permission_token();
        socket.push_word(token);
        socket.send_queue()?;
        if token != START_PERMITTED {
            info!(%peer, "participant denied");
            socket.disconnect();
            return Ok(());
        }
        info!(%peer, "participant admitted");
    }

    let mut signalled = false;
    loop {
        match socket.receive_queue() {
            Ok(()) => {}
            Err(err) if err.is_closed() => {
                info!(%peer, "node disconnected");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        let request = Request::decode(&mut socket)?;
        debug!(%peer, kind = ?request.kind(), "request");
        let ack = match shared.apply(&request) {
            Ok(ack) => ack,
            Err(err) => {
                // No ack kind carries an error; dropping the connection is the only answer.
                socket.disconnect();
                return Err(err);
            }
        };
        if request == Request::GlobalInitComplete
            && role == ConnectionRole::Initializer
            && !signalled
        {
            signalled = true;
            shared.initializer_done();
        }
        ack.encode(&mut socket);
        socket.send_queue()?;
    }
}

/// Observes and stops a running server.
#[derive(Clone)]
pub struct ServerHandle {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Copy of the canonical bytes at `[addr, addr + len)`.
    pub fn snapshot(&self, addr: usize, len: usize) -> ServerResult<Vec<u8>> {
        Ok(self.shared.store.lock().read(addr, len)?.to_vec())
    }

    /// True once every initializer has signalled init completion.
    pub fn init_complete(&self) -> bool {
        self.shared.gate.lock().initializers_pending == 0
    }

    /// Stops accepting, releases gated participants with a denial and wakes the accept loop.
    pub fn shutdown(&self) {
        self.shared.stopping.store(true, Ordering::Release);
        {
            let _gate = self.shared.gate.lock();
            self.shared.gate_open.notify_all();
        }
        let _ = TcpStream::connect(self.addr);
    }
}
