use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use crate::error::ConfigError;

/// Address of a running `probe-rs dap-server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// IPv4 host.
    pub host: Ipv4Addr,
    /// TCP port.
    pub port: u16,
}

impl ServerAddress {
    /// Create an address from its parts.
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self { host, port }
    }

    /// Loopback address on `port`.
    pub fn localhost(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    /// Parse a `host:port` string.
    ///
    /// Surrounding whitespace is ignored; editors happily keep the trailing
    /// blanks users leave in their JSON.
    pub fn parse(server: &str) -> Result<Self, ConfigError> {
        let server = server.trim();
        let parts: Vec<&str> = server.split(':').collect();
        let [host, port] = parts.as_slice() else {
            return Err(ConfigError::ServerFormat(server.to_string()));
        };

        let host: Ipv4Addr = host
            .parse()
            .map_err(|_| ConfigError::ServerHost(host.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::ServerPort(port.to_string()))?;

        Ok(Self { host, port })
    }

    /// Socket address for connecting.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.host, self.port))
    }
}

impl FromStr for ServerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
