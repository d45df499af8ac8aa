use std::net::SocketAddr;

use transport::TransportConfig;
use uva_protocol::AddressWindow;

/// How a [`WindowServer`](crate::WindowServer) serves and gates its peers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Canonical shared window.
    pub window: AddressWindow,
    /// Range handed out by heap allocation requests.
    pub heap: Option<AddressWindow>,
    /// Leading connections treated as initializers. They receive no token.
    pub initializers: usize,
    /// Hold participants' tokens until every initializer signalled init completion.
    pub gate_participants: bool,
    /// Send the denial token to every participant and close the connection.
    pub deny_participants: bool,
    /// Bytes copied to the start of the window before serving.
    pub image: Option<Vec<u8>>,
    pub transport: TransportConfig,
}

impl ServerConfig {
    pub fn new(bind: SocketAddr, window: AddressWindow) -> Self {
        Self {
            bind,
            window,
            heap: None,
            initializers: 1,
            gate_participants: true,
            deny_participants: false,
            image: None,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_heap(mut self, heap: AddressWindow) -> Self {
        self.heap = Some(heap);
        self
    }

    pub fn with_initializers(mut self, initializers: usize) -> Self {
        self.initializers = initializers;
        self
    }

    pub fn with_gate(mut self, gate_participants: bool) -> Self {
        self.gate_participants = gate_participants;
        self
    }

    pub fn with_denied_participants(mut self, deny: bool) -> Self {
        self.deny_participants = deny;
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
