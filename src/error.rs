//! Error definitions.
//!
//! [`CodecError`] covers both wire codecs. [`Fault`] is the engine-level
//! taxonomy: every failure the session can observe is one of its four kinds,
//! and every kind resolves to a defined state transition.

use thiserror::Error;

/// Failures while turning bytes into messages or messages into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty message")]
    Empty,
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("malformed {0} message")]
    Malformed(&'static str),
    #[error("message truncated")]
    Truncated,
    #[error("string field is missing its NUL terminator")]
    MissingTerminator,
    #[error("field is not valid UTF-8")]
    InvalidUtf8,
    #[error("field contains an embedded NUL byte")]
    EmbeddedNul,
    #[error("unexpected trailing bytes")]
    TrailingBytes,
    #[error("reply result byte {0} is neither 0 nor 1")]
    InvalidResult(u8),
}

/// A failure observed by the session. All four kinds lead to the error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Local input that the session cannot accept in its current state.
    #[error("{0}")]
    Validation(String),
    /// Unrecognized or out-of-sequence inbound message.
    #[error("{0}")]
    Protocol(String),
    /// A confirmable message ran out of retransmissions.
    #[error("{0}")]
    Delivery(String),
    /// Socket failure or unexpected close.
    #[error("{0}")]
    Transport(String),
}

impl Fault {
    /// Reason text carried in the outbound `ERR` message.
    pub fn reason(&self) -> &str {
        match self {
            Fault::Validation(r) | Fault::Protocol(r) | Fault::Delivery(r) | Fault::Transport(r) => r,
        }
    }
}

impl From<CodecError> for Fault {
    fn from(_: CodecError) -> Self {
        Fault::Protocol("Unrecognized protocol message".into())
    }
}
