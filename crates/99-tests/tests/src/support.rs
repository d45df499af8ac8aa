use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use transport::TransportConfig;
use uva_runtime::{
    AcceptedBounds, AddressWindow, NodeRole, PageMapper, PeerAddress, RuntimeConfig,
    UvaCoordinator, UvaResult,
};
use window_server::{ServerConfig, ServerHandle, WindowServer};

pub const PAGE: usize = 4096;

/// For windows over memory the test already owns.
pub struct PrebackedMapper;

impl PageMapper for PrebackedMapper {
    fn page_size(&self) -> usize {
        PAGE
    }

    fn map_page(&self, _page: usize) -> UvaResult<()> {
        Ok(())
    }
}

/// Page-aligned heap memory a coordinator can use as its window.
pub struct Backing {
    _buf: Vec<u8>,
    pub window: AddressWindow,
}

impl Backing {
    pub fn new(pages: usize) -> Self {
        let mut buf = vec![0u8; (pages + 1) * PAGE];
        let base = (buf.as_mut_ptr() as usize + PAGE - 1) & !(PAGE - 1);
        Self {
            _buf: buf,
            window: AddressWindow::from_len(base, pages * PAGE).unwrap(),
        }
    }

    pub fn bytes(&self, addr: usize, len: usize) -> Vec<u8> {
        assert!(self.window.covers(addr, len));
        // SAFETY: the range lies inside `_buf`.
        unsafe { std::slice::from_raw_parts(addr as *const u8, len) }.to_vec()
    }
}

pub fn transport() -> TransportConfig {
    TransportConfig::default().with_io_timeout(Some(Duration::from_secs(5)))
}

pub fn server_config(window: AddressWindow) -> ServerConfig {
    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    ServerConfig::new(bind, window).with_transport(transport())
}

pub fn start(config: ServerConfig) -> ServerHandle {
    let (handle, _accept) = WindowServer::bind(config).unwrap().spawn().unwrap();
    handle
}

pub fn runtime_config(server: &ServerHandle, window: AddressWindow, role: NodeRole) -> RuntimeConfig {
    RuntimeConfig::new(PeerAddress::new("127.0.0.1", server.local_addr().port()), window)
        .with_role(role)
        .with_accepted(AcceptedBounds::covering(window))
        .with_transport(transport())
}

/// A node whose window is plain memory owned by the test.
///
/// # Safety
///
/// `window` must stay backed by live memory until the coordinator is finalized.
pub unsafe fn connect_node(server: &ServerHandle, window: AddressWindow, role: NodeRole) -> UvaCoordinator {
    let config = runtime_config(server, window, role);
    // SAFETY: forwarded from the caller.
    unsafe { UvaCoordinator::connect(&config, Arc::new(PrebackedMapper)) }.unwrap()
}
