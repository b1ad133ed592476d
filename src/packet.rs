//! Binary wire format for the UDP transport.
//!
//! Every datagram exchanged with the server is one [`Packet`]. This module
//! defines the layout, serialises packets into byte buffers, and parses raw
//! datagrams back, returning errors for unknown opcodes and malformed or
//! truncated input.
//!
//! Nothing in this module touches a socket.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**; all strings are NUL-terminated.
//!
//! ```text
//! 0x00 CONFIRM  [op][refMessageId:2]
//! 0x01 REPLY    [op][messageId:2][result:1][refMessageId:2][content\0]
//! 0x02 AUTH     [op][messageId:2][username\0][displayName\0][secret\0]
//! 0x03 JOIN     [op][messageId:2][channelId\0][displayName\0]
//! 0x04 MSG      [op][messageId:2][displayName\0][content\0]
//! 0xFE ERR      [op][messageId:2][displayName\0][content\0]
//! 0xFF BYE      [op][messageId:2]
//! ```

use crate::error::CodecError;
use crate::message::{Outbound, ProtocolEvent};

/// Opcode constants for the first byte of every datagram.
pub mod opcode {
    pub const CONFIRM: u8 = 0x00;
    pub const REPLY: u8 = 0x01;
    pub const AUTH: u8 = 0x02;
    pub const JOIN: u8 = 0x03;
    pub const MSG: u8 = 0x04;
    pub const ERR: u8 = 0xFE;
    pub const BYE: u8 = 0xFF;
}

/// Byte length of `[opcode][messageId]`, the prefix shared by every packet.
pub const HEADER_LEN: usize = 3;

/// One decoded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Confirm {
        ref_id: u16,
    },
    Reply {
        id: u16,
        ok: bool,
        ref_id: u16,
        content: String,
    },
    Auth {
        id: u16,
        username: String,
        display_name: String,
        secret: String,
    },
    Join {
        id: u16,
        channel_id: String,
        display_name: String,
    },
    Msg {
        id: u16,
        display_name: String,
        content: String,
    },
    Err {
        id: u16,
        display_name: String,
        content: String,
    },
    Bye {
        id: u16,
    },
}

impl Packet {
    /// Wrap an outbound message with the message ID it will travel under.
    pub fn from_outbound(id: u16, msg: &Outbound) -> Self {
        match msg.clone() {
            Outbound::Auth {
                username,
                display_name,
                secret,
            } => Packet::Auth {
                id,
                username,
                display_name,
                secret,
            },
            Outbound::Join {
                channel_id,
                display_name,
            } => Packet::Join {
                id,
                channel_id,
                display_name,
            },
            Outbound::Msg {
                display_name,
                content,
            } => Packet::Msg {
                id,
                display_name,
                content,
            },
            Outbound::Err {
                display_name,
                content,
            } => Packet::Err {
                id,
                display_name,
                content,
            },
            Outbound::Bye => Packet::Bye { id },
        }
    }

    /// The sender-assigned message ID, or `None` for `CONFIRM`.
    pub fn message_id(&self) -> Option<u16> {
        match self {
            Packet::Confirm { .. } => None,
            Packet::Reply { id, .. }
            | Packet::Auth { id, .. }
            | Packet::Join { id, .. }
            | Packet::Msg { id, .. }
            | Packet::Err { id, .. }
            | Packet::Bye { id } => Some(*id),
        }
    }

    /// Convert a server-originated packet into a session event.
    ///
    /// Returns `None` for `AUTH` and `JOIN`, which only clients send.
    pub fn into_event(self) -> Option<ProtocolEvent> {
        match self {
            Packet::Confirm { ref_id } => Some(ProtocolEvent::Confirm { ref_id }),
            Packet::Reply {
                ok, ref_id, content, ..
            } => Some(ProtocolEvent::Reply {
                ok,
                ref_id: Some(ref_id),
                text: content,
            }),
            Packet::Msg {
                display_name,
                content,
                ..
            } => Some(ProtocolEvent::ChatMsg {
                from: display_name,
                text: content,
            }),
            Packet::Err {
                display_name,
                content,
                ..
            } => Some(ProtocolEvent::ErrMsg {
                from: display_name,
                text: content,
            }),
            Packet::Bye { .. } => Some(ProtocolEvent::Bye),
            Packet::Auth { .. } | Packet::Join { .. } => None,
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// Fails with [`CodecError::EmbeddedNul`] if any string field contains a
    /// NUL byte, since it could not be told apart from the terminator.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(32);
        match self {
            Packet::Confirm { ref_id } => {
                buf.push(opcode::CONFIRM);
                buf.extend_from_slice(&ref_id.to_be_bytes());
            }
            Packet::Reply {
                id,
                ok,
                ref_id,
                content,
            } => {
                put_header(&mut buf, opcode::REPLY, *id);
                buf.push(u8::from(*ok));
                buf.extend_from_slice(&ref_id.to_be_bytes());
                put_str(&mut buf, content)?;
            }
            Packet::Auth {
                id,
                username,
                display_name,
                secret,
            } => {
                put_header(&mut buf, opcode::AUTH, *id);
                put_str(&mut buf, username)?;
                put_str(&mut buf, display_name)?;
                put_str(&mut buf, secret)?;
            }
            Packet::Join {
                id,
                channel_id,
                display_name,
            } => {
                put_header(&mut buf, opcode::JOIN, *id);
                put_str(&mut buf, channel_id)?;
                put_str(&mut buf, display_name)?;
            }
            Packet::Msg {
                id,
                display_name,
                content,
            } => {
                put_header(&mut buf, opcode::MSG, *id);
                put_str(&mut buf, display_name)?;
                put_str(&mut buf, content)?;
            }
            Packet::Err {
                id,
                display_name,
                content,
            } => {
                put_header(&mut buf, opcode::ERR, *id);
                put_str(&mut buf, display_name)?;
                put_str(&mut buf, content)?;
            }
            Packet::Bye { id } => put_header(&mut buf, opcode::BYE, *id),
        }
        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Returns [`Err`] if the opcode is unknown, a fixed-size field is cut
    /// short, a string lacks its terminator, or bytes follow the last field.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut cur = Cursor::new(buf);
        let op = cur.u8()?;

        if op == opcode::CONFIRM {
            let ref_id = cur.u16()?;
            cur.finish()?;
            return Ok(Packet::Confirm { ref_id });
        }

        let id = cur.u16()?;
        let packet = match op {
            opcode::REPLY => {
                let ok = match cur.u8()? {
                    0 => false,
                    1 => true,
                    other => return Err(CodecError::InvalidResult(other)),
                };
                let ref_id = cur.u16()?;
                let content = cur.string()?;
                Packet::Reply {
                    id,
                    ok,
                    ref_id,
                    content,
                }
            }
            opcode::AUTH => Packet::Auth {
                id,
                username: cur.string()?,
                display_name: cur.string()?,
                secret: cur.string()?,
            },
            opcode::JOIN => Packet::Join {
                id,
                channel_id: cur.string()?,
                display_name: cur.string()?,
            },
            opcode::MSG => Packet::Msg {
                id,
                display_name: cur.string()?,
                content: cur.string()?,
            },
            opcode::ERR => Packet::Err {
                id,
                display_name: cur.string()?,
                content: cur.string()?,
            },
            opcode::BYE => Packet::Bye { id },
            other => return Err(CodecError::UnknownOpcode(other)),
        };
        cur.finish()?;
        Ok(packet)
    }
}

/// Build a `CONFIRM` for an inbound message ID.
pub fn confirm_bytes(ref_id: u16) -> [u8; HEADER_LEN] {
    let [hi, lo] = ref_id.to_be_bytes();
    [opcode::CONFIRM, hi, lo]
}

fn put_header(buf: &mut Vec<u8>, op: u8, id: u16) {
    buf.push(op);
    buf.extend_from_slice(&id.to_be_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<(), CodecError> {
    if s.as_bytes().contains(&0) {
        return Err(CodecError::EmbeddedNul);
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    Ok(())
}

/// Read position over an inbound datagram.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        let b = *self.buf.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 2)
            .ok_or(CodecError::Truncated)?;
        self.pos += 2;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::MissingTerminator)?;
        let s = std::str::from_utf8(&rest[..end]).map_err(|_| CodecError::InvalidUtf8)?;
        self.pos += end + 1;
        Ok(s.to_string())
    }

    fn finish(&self) -> Result<(), CodecError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_roundtrip_keeps_fields() {
        let pkt = Packet::Join {
            id: 7,
            channel_id: "general".into(),
            display_name: "bob".into(),
        };
        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn auth_layout_on_wire() {
        let pkt = Packet::Auth {
            id: 0x0102,
            username: "u".into(),
            display_name: "d".into(),
            secret: "s".into(),
        };
        assert_eq!(
            pkt.encode().unwrap(),
            vec![0x02, 0x01, 0x02, b'u', 0, b'd', 0, b's', 0]
        );
    }

    #[test]
    fn confirm_and_bye_layout() {
        assert_eq!(
            Packet::Confirm { ref_id: 0xABCD }.encode().unwrap(),
            vec![0x00, 0xAB, 0xCD]
        );
        assert_eq!(confirm_bytes(0xABCD), [0x00, 0xAB, 0xCD]);
        assert_eq!(Packet::Bye { id: 5 }.encode().unwrap(), vec![0xFF, 0x00, 0x05]);
    }

    #[test]
    fn decode_reply_from_server() {
        let mut raw = vec![0x01, 0x00, 0x09, 0x01, 0x00, 0x03];
        raw.extend_from_slice(b"Auth success\0");
        assert_eq!(
            Packet::decode(&raw).unwrap(),
            Packet::Reply {
                id: 9,
                ok: true,
                ref_id: 3,
                content: "Auth success".into()
            }
        );
    }

    #[test]
    fn decode_reply_rejects_bad_result_byte() {
        let raw = [0x01, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00];
        assert_eq!(Packet::decode(&raw), Err(CodecError::InvalidResult(2)));
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert_eq!(Packet::decode(&[]), Err(CodecError::Truncated));
    }

    #[test]
    fn decode_truncated_id_returns_error() {
        assert_eq!(Packet::decode(&[0x04, 0x00]), Err(CodecError::Truncated));
        assert_eq!(Packet::decode(&[0x00, 0x01]), Err(CodecError::Truncated));
    }

    #[test]
    fn decode_missing_terminator_returns_error() {
        let raw = [0x04, 0x00, 0x01, b'a', 0, b'h', b'i'];
        assert_eq!(Packet::decode(&raw), Err(CodecError::MissingTerminator));
    }

    #[test]
    fn decode_unknown_opcode_returns_error() {
        assert_eq!(
            Packet::decode(&[0x42, 0x00, 0x01]),
            Err(CodecError::UnknownOpcode(0x42))
        );
    }

    #[test]
    fn decode_trailing_bytes_returns_error() {
        assert_eq!(
            Packet::decode(&[0xFF, 0x00, 0x01, 0x00]),
            Err(CodecError::TrailingBytes)
        );
    }

    #[test]
    fn encode_rejects_embedded_nul() {
        let pkt = Packet::Msg {
            id: 1,
            display_name: "bob".into(),
            content: "a\0b".into(),
        };
        assert_eq!(pkt.encode(), Err(CodecError::EmbeddedNul));
    }

    #[test]
    fn message_id_is_big_endian_on_wire() {
        let bytes = Packet::Msg {
            id: 0x1234,
            display_name: "x".into(),
            content: "y".into(),
        }
        .encode()
        .unwrap();
        assert_eq!(&bytes[1..3], &[0x12, 0x34]);
    }

    #[test]
    fn client_only_packets_have_no_event() {
        let pkt = Packet::Join {
            id: 1,
            channel_id: "c".into(),
            display_name: "d".into(),
        };
        assert_eq!(pkt.into_event(), None);
        assert_eq!(
            Packet::Bye { id: 3 }.into_event(),
            Some(ProtocolEvent::Bye)
        );
    }
}
