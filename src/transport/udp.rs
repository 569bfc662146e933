//! UDP datagram transport
//!
//! Wraps a connected [`UdpSocket`]; every frame travels as one datagram.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use super::{Transport, TransportError};
use crate::INFINITE_WAIT;

/// Transport over a UDP socket connected to a single peer
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `local` and connect it to `peer`
    pub fn bind(local: impl ToSocketAddrs, peer: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        Self::connect(socket, peer)
    }

    /// Connect an already bound socket to `peer`
    pub fn connect(socket: UdpSocket, peer: impl ToSocketAddrs) -> io::Result<Self> {
        socket.connect(peer)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    pub fn into_inner(self) -> UdpSocket {
        self.socket
    }
}

/// Socket timeouts cannot be zero; `None` blocks forever
fn socket_timeout(timeout_ms: u64) -> Option<Duration> {
    if timeout_ms == INFINITE_WAIT {
        None
    } else {
        Some(Duration::from_millis(timeout_ms.max(1)))
    }
}

impl Transport for UdpTransport {
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        self.socket.set_read_timeout(socket_timeout(timeout_ms))?;
        Ok(self.socket.recv(buf)?)
    }

    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        self.socket.set_write_timeout(socket_timeout(timeout_ms))?;
        Ok(self.socket.send(buf)?)
    }
}
