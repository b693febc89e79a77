// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP datagram socket.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use super::{Datagram, TransportError};

/// UDP socket with an optional read timeout.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind to `addr` (port 0 picks an ephemeral port).
    ///
    /// `read_timeout` bounds every `recv_from`; `None` blocks indefinitely.
    pub fn bind(addr: SocketAddr, read_timeout: Option<Duration>) -> Result<Self, TransportError> {
        let socket = Self::open(addr).map_err(|source| TransportError::Bind { addr, source })?;
        socket.set_read_timeout(read_timeout)?;
        log::debug!(
            "[UDP] bound addr={} read_timeout={:?}",
            socket.local_addr()?,
            read_timeout
        );
        Ok(Self { socket })
    }

    fn open(addr: SocketAddr) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        Ok(socket.into())
    }

    /// Change the read timeout.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }
}

impl Datagram for UdpTransport {
    fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::is_would_block;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[test]
    fn test_send_and_receive() {
        let a = UdpTransport::bind(loopback(), Some(Duration::from_secs(2))).unwrap();
        let b = UdpTransport::bind(loopback(), Some(Duration::from_secs(2))).unwrap();

        a.send_to(b"hello", b.local_addr().unwrap()).unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = b.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn test_read_timeout_is_would_block() {
        let a = UdpTransport::bind(loopback(), Some(Duration::from_millis(10))).unwrap();
        let mut buf = [0u8; 16];
        let err = a.recv_from(&mut buf).unwrap_err();
        assert!(is_would_block(&err));
    }
}
