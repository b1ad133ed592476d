//! TCP transport adapter.
//!
//! Outbound messages are written as single CRLF-terminated lines; TCP takes
//! care of delivery, so nothing is confirmed or retransmitted here. A spawned
//! receive loop decodes inbound lines and feeds them to the session; end of
//! stream is reported as an implicit `BYE`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::client::Input;
use crate::error::Fault;
use crate::message::{Outbound, ProtocolEvent};
use crate::text;
use crate::transport::{Transport, TransportError};

/// Upper bound on establishing the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A session's TCP connection.
pub struct StreamTransport {
    writer: OwnedWriteHalf,
    recv_task: JoinHandle<()>,
}

impl StreamTransport {
    /// Connect to `remote` and start the receive loop.
    pub async fn connect(
        remote: SocketAddr,
        inputs: mpsc::UnboundedSender<Input>,
    ) -> Result<Self, TransportError> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(remote))
            .await
            .map_err(|_| TransportError::ConnectTimeout)??;
        log::info!("[tcp] connected {} -> {remote}", stream.local_addr()?);
        Ok(Self::from_stream(stream, inputs))
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream, inputs: mpsc::UnboundedSender<Input>) -> Self {
        let (reader, writer) = stream.into_split();
        let recv_task = tokio::spawn(receive_loop(reader, inputs));
        Self { writer, recv_task }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&mut self, msg: &Outbound) -> Result<(), TransportError> {
        let line = text::encode(msg);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        log::debug!("[tcp] -> {}", line.trim_end());
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            log::debug!("[tcp] shutdown: {e}");
        }
        self.recv_task.abort();
        log::debug!("[tcp] closed");
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn receive_loop(reader: OwnedReadHalf, inputs: mpsc::UnboundedSender<Input>) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        let (input, done) = match lines.next_line().await {
            Ok(Some(line)) => {
                log::debug!("[tcp] <- {line}");
                match text::decode(&line) {
                    Ok(event) => (Input::Event(event), false),
                    Err(e) => {
                        log::warn!("[tcp] undecodable line {line:?}: {e}");
                        (Input::Fault(e.into()), false)
                    }
                }
            }
            Ok(None) => {
                log::info!("[tcp] connection closed by server");
                (Input::Event(ProtocolEvent::Bye), true)
            }
            Err(e) => {
                log::warn!("[tcp] receive failed: {e}");
                (Input::Fault(Fault::Transport(e.to_string())), true)
            }
        };

        if inputs.send(input).is_err() || done {
            break;
        }
    }
    log::debug!("[tcp] receive loop finished");
}
