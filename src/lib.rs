//! `ipk-chat`: a chat client for the IPK protocol over TCP or UDP.
//!
//! # Architecture
//!
//! ```text
//!   stdin lines ──▶ ClientHandle ──┐
//!                                  │  Input (single mpsc queue)
//!   receive loop ──────────────────┤
//!   (one task per transport)       ▼
//!                          ┌───────────────┐   ClientEvent
//!                          │ session actor │──────────────▶ presentation
//!                          │  (Session FSM)│
//!                          └───────┬───────┘
//!                                  │ Transport::send / close
//!                 ┌────────────────┴─────────────────┐
//!          ┌──────▼──────┐                    ┌──────▼──────┐
//!          │   Stream    │                    │  Datagram   │
//!          │ (text lines)│                    │  (packets)  │
//!          └──────┬──────┘                    └──────┬──────┘
//!                 │                           ┌──────▼──────┐
//!                 │                           │ Reliability │
//!                 │                           └──────┬──────┘
//!              TcpStream                        UdpSocket
//! ```
//!
//! Each module has a single responsibility:
//! - [`message`]: protocol-level message types shared by both codecs
//! - [`text`]: line-framed codec used over TCP
//! - [`packet`]: binary codec used over UDP
//! - [`command`]: parsing of local `/command` lines
//! - [`state`]: session state type
//! - [`session`]: pure session state machine
//! - [`reliability`]: message IDs, confirmation waiting, retransmission
//! - [`socket`]: async UDP socket abstraction with endpoint migration
//! - [`transport`]: the `Transport` trait the session is driven through
//! - [`stream`]: TCP transport adapter
//! - [`datagram`]: UDP transport adapter
//! - [`client`]: session actor and the public start/submit/terminate API
//! - [`config`]: validated connection configuration
//! - [`error`]: fault taxonomy funnelled into the error state

pub mod client;
pub mod command;
pub mod config;
pub mod datagram;
pub mod error;
pub mod message;
pub mod packet;
pub mod reliability;
pub mod session;
pub mod socket;
pub mod state;
pub mod stream;
pub mod text;
pub mod transport;

pub use client::{Client, ClientHandle, EventStream};
pub use config::{Config, TransportKind};
pub use message::{ClientEvent, Outbound, ProtocolEvent};
pub use state::SessionState;
