//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Packet`] on the receive side and tracks the server
//! endpoint. The first datagram that arrives fixes the endpoint for the rest
//! of the session (the server may answer from a different port than the one
//! the client first wrote to); later datagrams from any other address are
//! dropped.

use std::net::SocketAddr;
use std::sync::OnceLock;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::error::CodecError;
use crate::packet::Packet;

/// Maximum UDP payload size.
const MAX_DATAGRAM: usize = 65_535;

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The received datagram could not be decoded as a valid packet.
    #[error("packet decode error: {0}")]
    Packet(#[from] CodecError),
}

/// An async, packet-oriented UDP socket bound to one server.
///
/// All methods are `&self` so the socket can be shared between the receive
/// loop and the reliability layer.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    /// Destination before the server has answered.
    configured: SocketAddr,
    /// Endpoint the server's first datagram came from.
    migrated: OnceLock<SocketAddr>,
}

impl Socket {
    /// Bind a new socket to `local_addr` that initially targets `remote`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr, remote: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            configured: remote,
            migrated: OnceLock::new(),
        })
    }

    /// Where outbound datagrams currently go.
    pub fn peer(&self) -> SocketAddr {
        self.migrated.get().copied().unwrap_or(self.configured)
    }

    /// `true` once the server endpoint has been learned.
    pub fn has_migrated(&self) -> bool {
        self.migrated.get().is_some()
    }

    /// Send raw bytes as a single datagram to the current peer.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), SocketError> {
        self.inner.send_to(bytes, self.peer()).await?;
        Ok(())
    }

    /// Receive the next datagram from the server and decode it.
    ///
    /// Returns `(packet, sender_address)`. Datagrams from addresses other
    /// than the migrated endpoint are skipped. Datagrams that fail to decode
    /// are returned as `Err`; the caller decides what that means.
    pub async fn recv(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (n, addr) = self.inner.recv_from(&mut buf).await?;
            match self.migrated.get() {
                None => {
                    if self.migrated.set(addr).is_ok() && addr != self.configured {
                        log::info!("[socket] server endpoint migrated {} -> {addr}", self.configured);
                    }
                }
                Some(&peer) if peer != addr => {
                    log::warn!("[socket] dropping {n}-byte datagram from stranger {addr}");
                    continue;
                }
                Some(_) => {}
            }
            let packet = Packet::decode(&buf[..n])?;
            return Ok((packet, addr));
        }
    }
}
