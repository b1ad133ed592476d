//! Stop-and-wait reliability for the UDP transport.
//!
//! [`ReliableSender`] numbers outbound messages and turns a confirmable send
//! into one blocking operation:
//!
//! 1. allocate the next message ID, encode once, record a [`PendingSend`];
//! 2. transmit, then wait until the attempt deadline for a `CONFIRM`
//!    naming that ID; other IDs are stale and ignored;
//! 3. on timeout retransmit the identical bytes, up to `max_retries` times;
//! 4. fail with [`TransportError::NotConfirmed`] once attempts run out.
//!
//! # Stop-and-wait contract
//! - At most **one** message is pending at any moment.
//! - Message IDs increase by one per message (wrapping at `u16::MAX`) and are
//!   never reused within a session; a retransmission reuses its original ID.
//!
//! Confirmations arrive from the receive loop over an mpsc channel, so a
//! `CONFIRM` ends the wait as soon as it is read off the socket.
//!
//! [`SeenIds`] is the receive-side counterpart: it remembers recent inbound
//! message IDs so retransmitted copies are confirmed but not surfaced twice.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::message::Outbound;
use crate::packet::Packet;
use crate::socket::Socket;
use crate::transport::TransportError;

/// A message that has been sent but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub message_id: u16,
    /// The exact bytes on the wire; retransmissions resend these.
    pub payload: Vec<u8>,
    /// Transmissions still allowed after the current one.
    pub attempts_left: u32,
    /// When the current attempt gives up waiting.
    pub deadline: Instant,
}

/// Outbound numbering and confirmation tracking for one session.
#[derive(Debug)]
pub struct ReliableSender {
    socket: Arc<Socket>,
    /// ID of the **next** message to send.
    next_id: u16,
    pending: Option<PendingSend>,
    confirms: mpsc::UnboundedReceiver<u16>,
    timeout: Duration,
    max_retries: u32,
}

impl ReliableSender {
    pub fn new(
        socket: Arc<Socket>,
        confirms: mpsc::UnboundedReceiver<u16>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            socket,
            next_id: 0,
            pending: None,
            confirms,
            timeout,
            max_retries,
        }
    }

    /// ID the next outbound message will carry.
    pub fn next_id(&self) -> u16 {
        self.next_id
    }

    /// The in-flight message, or `None` when idle.
    pub fn pending(&self) -> Option<&PendingSend> {
        self.pending.as_ref()
    }

    fn allocate_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Send `msg` and block until the server confirms it.
    ///
    /// Returns the message ID it travelled under.
    pub async fn send_confirmable(&mut self, msg: &Outbound) -> Result<u16, TransportError> {
        debug_assert!(
            self.pending.is_none(),
            "send_confirmable called while a message is already pending"
        );
        let id = self.allocate_id();
        let payload = Packet::from_outbound(id, msg).encode()?;
        self.pending = Some(PendingSend {
            message_id: id,
            payload,
            attempts_left: self.max_retries,
            deadline: Instant::now() + self.timeout,
        });

        let result = self.drive_pending(msg.verb()).await;
        self.pending = None;
        result.map(|()| id)
    }

    /// Transmit `msg` once without waiting for a confirmation.
    pub async fn send_unconfirmed(&mut self, msg: &Outbound) -> Result<u16, TransportError> {
        let id = self.allocate_id();
        let bytes = Packet::from_outbound(id, msg).encode()?;
        self.socket.send(&bytes).await?;
        log::debug!("[udp] -> {} id={id} (unconfirmed)", msg.verb());
        Ok(id)
    }

    async fn drive_pending(&mut self, verb: &str) -> Result<(), TransportError> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };
        let id = pending.message_id;
        let mut attempt = 1u32;

        loop {
            self.socket.send(&pending.payload).await?;
            pending.deadline = Instant::now() + self.timeout;
            log::debug!(
                "[udp] -> {verb} id={id} attempt={attempt} peer={}",
                self.socket.peer()
            );

            loop {
                match timeout_at(pending.deadline, self.confirms.recv()).await {
                    Ok(Some(ref_id)) if ref_id == id => {
                        log::debug!("[udp] <- CONFIRM id={id}");
                        return Ok(());
                    }
                    Ok(Some(stale)) => {
                        log::debug!("[udp] <- CONFIRM id={stale} ignored (waiting for {id})");
                    }
                    Ok(None) => return Err(TransportError::Closed),
                    Err(_elapsed) => break,
                }
            }

            if pending.attempts_left == 0 {
                log::warn!("[udp] {verb} id={id} not confirmed after {attempt} attempts");
                return Err(TransportError::NotConfirmed {
                    id,
                    attempts: attempt,
                });
            }
            pending.attempts_left -= 1;
            attempt += 1;
        }
    }
}

/// Bounded memory of recently received inbound message IDs.
#[derive(Debug)]
pub struct SeenIds {
    capacity: usize,
    order: VecDeque<u16>,
    set: HashSet<u16>,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    /// Record `id`. Returns `true` the first time an ID is seen within the
    /// window, `false` for a duplicate.
    pub fn insert(&mut self, id: u16) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }

    pub fn contains(&self, id: u16) -> bool {
        self.set.contains(&id)
    }
}
