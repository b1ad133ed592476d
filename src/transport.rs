//! The delivery capability the session actor drives.
//!
//! The stream adapter writes each message once and relies on TCP for
//! delivery; the datagram adapter routes everything except `BYE` through
//! [`crate::reliability::ReliableSender`]. Inbound traffic does not pass
//! through this trait: each adapter spawns its own receive loop feeding the
//! session input queue.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{CodecError, Fault};
use crate::message::Outbound;
use crate::socket::SocketError;

/// Errors surfaced by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode message: {0}")]
    Codec(#[from] CodecError),
    #[error("message {id} not confirmed after {attempts} attempts")]
    NotConfirmed { id: u16, attempts: u32 },
    #[error("connection timed out")]
    ConnectTimeout,
    #[error("transport closed")]
    Closed,
}

impl From<SocketError> for TransportError {
    fn from(e: SocketError) -> Self {
        match e {
            SocketError::Io(e) => TransportError::Io(e),
            SocketError::Packet(e) => TransportError::Codec(e),
        }
    }
}

impl From<TransportError> for Fault {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotConfirmed { .. } => Fault::Delivery("message not confirmed".into()),
            TransportError::Codec(e) => Fault::Validation(e.to_string()),
            other => Fault::Transport(other.to_string()),
        }
    }
}

/// Outbound half of a connection.
#[async_trait]
pub trait Transport: Send {
    /// Deliver one message.
    ///
    /// Returns once the message is handed to the OS (stream) or confirmed by
    /// the server (datagram). `BYE` is never waited on.
    async fn send(&mut self, msg: &Outbound) -> Result<(), TransportError>;

    /// Release the connection and stop the receive loop.
    async fn close(&mut self);
}
