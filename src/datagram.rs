//! UDP transport adapter.
//!
//! ```text
//!  session actor ──send──▶ ReliableSender ──bytes──▶ Socket ──▶ server
//!                               ▲                      │
//!                               │ CONFIRM ref ids      │
//!                         receive loop ◀───────────────┘
//!                               │ CONFIRM every app message
//!                               │ forward first copy as Input::Event
//!                               ▼
//!                        session input queue
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::Input;
use crate::config::Config;
use crate::error::Fault;
use crate::message::Outbound;
use crate::packet::{confirm_bytes, Packet};
use crate::reliability::{ReliableSender, SeenIds};
use crate::socket::{Socket, SocketError};
use crate::transport::{Transport, TransportError};

/// How many recent inbound message IDs are remembered for duplicate suppression.
pub const SEEN_WINDOW: usize = 1024;

/// A session's UDP connection.
pub struct DatagramTransport {
    sender: ReliableSender,
    recv_task: JoinHandle<()>,
}

impl DatagramTransport {
    /// Bind an ephemeral local port and start the receive loop.
    pub async fn bind(
        config: &Config,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Result<Self, TransportError> {
        let local: SocketAddr = ([0, 0, 0, 0], 0).into();
        let socket = Arc::new(Socket::bind(local, config.remote_addr()).await?);
        log::info!(
            "[udp] bound {} targeting {}",
            socket.local_addr,
            config.remote_addr()
        );

        let (confirm_tx, confirm_rx) = mpsc::unbounded_channel();
        let recv_task = tokio::spawn(receive_loop(Arc::clone(&socket), confirm_tx, inputs));
        let sender = ReliableSender::new(
            socket,
            confirm_rx,
            config.confirmation_timeout,
            config.max_retries,
        );
        Ok(Self { sender, recv_task })
    }
}

#[async_trait]
impl Transport for DatagramTransport {
    async fn send(&mut self, msg: &Outbound) -> Result<(), TransportError> {
        match msg {
            Outbound::Bye => self.sender.send_unconfirmed(msg).await.map(drop),
            _ => self.sender.send_confirmable(msg).await.map(drop),
        }
    }

    async fn close(&mut self) {
        self.recv_task.abort();
        log::debug!("[udp] closed");
    }
}

impl Drop for DatagramTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

/// Read datagrams until the socket fails or the session stops listening.
async fn receive_loop(
    socket: Arc<Socket>,
    confirms: mpsc::UnboundedSender<u16>,
    inputs: mpsc::UnboundedSender<Input>,
) {
    let mut seen = SeenIds::new(SEEN_WINDOW);

    loop {
        let input = match socket.recv().await {
            Ok((Packet::Confirm { ref_id }, _)) => {
                // The sender may already have given up; a late confirm is harmless.
                let _ = confirms.send(ref_id);
                continue;
            }
            Ok((packet, from)) => {
                let Some(id) = packet.message_id() else {
                    continue;
                };
                if let Err(e) = socket.send(&confirm_bytes(id)).await {
                    log::warn!("[udp] failed to confirm id={id} to {from}: {e}");
                    let _ = inputs.send(Input::Fault(Fault::Transport(e.to_string())));
                    break;
                }
                log::debug!("[udp] <- {packet:?} from {from}; -> CONFIRM id={id}");

                if !seen.insert(id) {
                    log::debug!("[udp] duplicate id={id} confirmed again, not surfaced");
                    continue;
                }
                match packet.into_event() {
                    Some(event) => Input::Event(event),
                    None => Input::Fault(Fault::Protocol("unexpected message from server".into())),
                }
            }
            Err(SocketError::Packet(e)) => {
                log::warn!("[udp] undecodable datagram: {e}");
                Input::Fault(e.into())
            }
            Err(SocketError::Io(e)) => {
                log::warn!("[udp] receive failed: {e}");
                let _ = inputs.send(Input::Fault(Fault::Transport(e.to_string())));
                break;
            }
        };

        if inputs.send(input).is_err() {
            break;
        }
    }
    log::debug!("[udp] receive loop finished");
}
