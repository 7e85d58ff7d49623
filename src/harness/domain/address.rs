//! Network address of a server instance.

use super::HarnessDomainError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

const TCP_SCHEME: &str = "tcp://";

/// Address of a server instance, rendered as `tcp://host:port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerAddress(SocketAddr);

impl ServerAddress {
    /// Wraps a socket address.
    #[must_use]
    pub const fn tcp(socket: SocketAddr) -> Self {
        Self(socket)
    }

    /// Address that binds all interfaces on an OS-assigned port.
    #[must_use]
    pub const fn ephemeral() -> Self {
        Self(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }

    /// Returns the wrapped socket address.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    /// Returns the port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.0.port()
    }

    /// Returns the address a client should dial.
    ///
    /// Unspecified bind addresses are mapped to the matching loopback
    /// address.
    #[must_use]
    pub const fn dial_addr(&self) -> SocketAddr {
        match self.0.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.0.port())
            }
            IpAddr::V6(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), self.0.port())
            }
            _ => self.0,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{TCP_SCHEME}{}", self.0)
    }
}

impl FromStr for ServerAddress {
    type Err = HarnessDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .strip_prefix(TCP_SCHEME)
            .and_then(|socket| socket.parse::<SocketAddr>().ok())
            .map(Self)
            .ok_or_else(|| HarnessDomainError::InvalidServerAddress(value.to_owned()))
    }
}
