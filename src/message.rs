//! Protocol-level message types.
//!
//! Both codecs translate between bytes and these types; nothing above the
//! transport boundary ever looks at raw protocol text or opcodes.

/// A message the client originates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Auth {
        username: String,
        display_name: String,
        secret: String,
    },
    Join {
        channel_id: String,
        display_name: String,
    },
    Msg {
        display_name: String,
        content: String,
    },
    Err {
        display_name: String,
        content: String,
    },
    Bye,
}

impl Outbound {
    /// `true` for messages that expect a `REPLY` from the server.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Outbound::Auth { .. } | Outbound::Join { .. })
    }

    /// Short verb name used in log lines.
    pub fn verb(&self) -> &'static str {
        match self {
            Outbound::Auth { .. } => "AUTH",
            Outbound::Join { .. } => "JOIN",
            Outbound::Msg { .. } => "MSG",
            Outbound::Err { .. } => "ERR",
            Outbound::Bye => "BYE",
        }
    }
}

/// A message decoded from the server.
///
/// `Confirm` never reaches the session: the datagram receive loop hands it
/// straight to the reliability layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Reply {
        ok: bool,
        /// ID of the request being answered (datagram path only).
        ref_id: Option<u16>,
        text: String,
    },
    ChatMsg {
        from: String,
        text: String,
    },
    ErrMsg {
        from: String,
        text: String,
    },
    Bye,
    Confirm {
        ref_id: u16,
    },
}

/// Semantic events for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Info(String),
    ChatLine { from: String, text: String },
    ProtocolError(String),
    Fatal(String),
}

impl std::fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEvent::Info(text) => write!(f, "{text}"),
            ClientEvent::ChatLine { from, text } => write!(f, "{from}: {text}"),
            ClientEvent::ProtocolError(text) => write!(f, "{text}"),
            ClientEvent::Fatal(text) => write!(f, "ERR: {text}"),
        }
    }
}
