//! Fire-and-forget UDP datagram sender

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::warn;

/// Unicast or multicast UDP sender. Delivery is fire-and-forget: a failed
/// send is logged and reported as `false`, never an error.
#[derive(Debug)]
pub struct UdpSender {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSender {
    /// Unicast sender: resolves `host` once at construction.
    ///
    /// # Errors
    ///
    /// Fails when the local socket cannot be bound or `host` does not
    /// resolve.
    pub fn unicast(host: &str, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        let dest = (host, port)
            .to_socket_addrs()?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {host}")))?;
        Ok(Self { socket, dest })
    }

    /// Multicast sender targeting `group:port` with the given TTL.
    ///
    /// # Errors
    ///
    /// Fails when the local socket cannot be bound or configured.
    pub fn multicast(group: Ipv4Addr, port: u16, ttl: u32) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_multicast_ttl_v4(ttl)?;
        Ok(Self { socket, dest: SocketAddr::from((group, port)) })
    }

    /// Send one datagram. Returns `false` (after logging) on failure.
    pub fn send(&self, data: &[u8]) -> bool {
        match self.socket.send_to(data, self.dest) {
            Ok(_) => true,
            Err(e) => {
                warn!(dest = %self.dest, error = %e, "udp send failed");
                false
            }
        }
    }

    /// Destination this sender targets.
    #[must_use]
    pub const fn dest(&self) -> SocketAddr {
        self.dest
    }
}
