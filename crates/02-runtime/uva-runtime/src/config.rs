use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use transport::TransportConfig;
use uva_protocol::AddressWindow;

use crate::error::{UvaError, UvaResult};
use crate::window::AcceptedBounds;

/// Which side of the startup gate a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Runs global constructors and passes the startup gate without waiting.
    Authority,
    /// Waits for the permission token before touching shared state.
    Participant,
}

/// Host and port of the window server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    /// IP address or hostname.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl PeerAddress {
    /// Address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses a server descriptor: `"<ip> <port>"`, whitespace separated.
    pub fn parse_desc(desc: &str) -> UvaResult<Self> {
        let mut fields = desc.split_whitespace();
        let host = fields
            .next()
            .ok_or_else(|| UvaError::config("server descriptor is empty"))?;
        let port = fields
            .next()
            .ok_or_else(|| UvaError::config("server descriptor has no port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|err| UvaError::config(format!("bad port `{port}`: {err}")))?;
        Ok(Self::new(host, port))
    }

    /// Reads and parses a server descriptor file.
    pub fn from_desc_file(path: impl AsRef<Path>) -> UvaResult<Self> {
        let path = path.as_ref();
        let desc = fs::read_to_string(path)
            .map_err(|err| UvaError::config(format!("reading {}: {err}", path.display())))?;
        Self::parse_desc(&desc)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything a coordinator needs before it connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Window server to dial.
    pub peer: PeerAddress,
    /// Startup role of this node.
    pub role: NodeRole,
    /// Shared window, identical on every node.
    pub window: AddressWindow,
    /// Ranges where faults are serviced. Always covers `window`.
    pub accepted: AcceptedBounds,
    /// Stream options for the connection.
    pub transport: TransportConfig,
}

impl RuntimeConfig {
    /// Participant config with the historical accepted range plus `window`.
    pub fn new(peer: PeerAddress, window: AddressWindow) -> Self {
        Self {
            peer,
            role: NodeRole::Participant,
            window,
            accepted: AcceptedBounds::default().with_range(window),
            transport: TransportConfig::default(),
        }
    }

    /// Sets the startup role.
    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    /// Replaces the accepted ranges; the window is added back if missing.
    pub fn with_accepted(mut self, accepted: AcceptedBounds) -> Self {
        self.accepted = accepted.with_range(self.window);
        self
    }

    /// Sets stream options.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_descriptor() {
        let peer = PeerAddress::parse_desc("10.0.0.7   7000\n").unwrap();
        assert_eq!(peer, PeerAddress::new("10.0.0.7", 7000));
        assert_eq!(peer.to_string(), "10.0.0.7:7000");

        assert!(matches!(PeerAddress::parse_desc(""), Err(UvaError::Config(_))));
        assert!(matches!(PeerAddress::parse_desc("10.0.0.7"), Err(UvaError::Config(_))));
        assert!(matches!(
            PeerAddress::parse_desc("10.0.0.7 seventy"),
            Err(UvaError::Config(_))
        ));
    }

    #[test]
    fn accepted_bounds_always_cover_window() {
        let window = AddressWindow::from_len(0x7000_0000, 0x1000).unwrap();
        let config = RuntimeConfig::new(PeerAddress::new("127.0.0.1", 1), window)
            .with_accepted(AcceptedBounds::empty());
        assert!(config.accepted.covers_window(&window));
        assert_eq!(config.role, NodeRole::Participant);
    }
}
