//! Trait abstraction for outgoing datagrams to enable testing

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Non-blocking datagram output
///
/// Sends must never wait for socket readiness: a datagram that cannot be
/// written right now is reported as `WouldBlock` and dropped by the caller.
pub trait DatagramSink: Send + Sync {
    /// Try to send one datagram to `target`
    fn try_send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl DatagramSink for UdpSocket {
    fn try_send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::try_send_to(self, data, target)
    }
}
