//! Line-framed codec for the TCP transport.
//!
//! One message per line, tokens separated by single spaces, lines terminated
//! by CRLF. Keywords are case-sensitive.
//!
//! ```text
//! out  AUTH {username} AS {displayName} USING {secret}
//! out  JOIN {channelId} AS {displayName}
//! out  MSG FROM {displayName} IS {text}
//! out  ERR FROM {displayName} IS {text}
//! out  BYE
//! in   REPLY {OK|NOK} IS {text}
//! in   {MSG|ERR} FROM {displayName} IS {text}
//! in   BYE
//! ```
//!
//! No I/O happens here.

use crate::error::CodecError;
use crate::message::{Outbound, ProtocolEvent};

/// Line terminator on the wire.
pub const CRLF: &str = "\r\n";

/// Render `msg` as one CRLF-terminated line.
pub fn encode(msg: &Outbound) -> String {
    let mut line = match msg {
        Outbound::Auth {
            username,
            display_name,
            secret,
        } => format!("AUTH {username} AS {display_name} USING {secret}"),
        Outbound::Join {
            channel_id,
            display_name,
        } => format!("JOIN {channel_id} AS {display_name}"),
        Outbound::Msg {
            display_name,
            content,
        } => format!("MSG FROM {display_name} IS {content}"),
        Outbound::Err {
            display_name,
            content,
        } => format!("ERR FROM {display_name} IS {content}"),
        Outbound::Bye => "BYE".to_string(),
    };
    line.push_str(CRLF);
    line
}

/// Parse one inbound line. A trailing CRLF (or bare LF) is accepted and ignored.
pub fn decode(line: &str) -> Result<ProtocolEvent, CodecError> {
    let line = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line);
    if line.is_empty() {
        return Err(CodecError::Empty);
    }

    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    match verb {
        "BYE" if rest.is_empty() && !line.contains(' ') => Ok(ProtocolEvent::Bye),
        "REPLY" => decode_reply(rest),
        "MSG" => {
            let (from, text) = decode_from_is(rest, "MSG")?;
            Ok(ProtocolEvent::ChatMsg { from, text })
        }
        "ERR" => {
            let (from, text) = decode_from_is(rest, "ERR")?;
            Ok(ProtocolEvent::ErrMsg { from, text })
        }
        "BYE" => Err(CodecError::Malformed("BYE")),
        other => Err(CodecError::UnknownVerb(other.to_string())),
    }
}

/// `{OK|NOK} IS {text}`
fn decode_reply(rest: &str) -> Result<ProtocolEvent, CodecError> {
    let mut parts = rest.splitn(3, ' ');
    let ok = match parts.next() {
        Some("OK") => true,
        Some("NOK") => false,
        _ => return Err(CodecError::Malformed("REPLY")),
    };
    if parts.next() != Some("IS") {
        return Err(CodecError::Malformed("REPLY"));
    }
    let text = parts.next().ok_or(CodecError::Malformed("REPLY"))?;
    Ok(ProtocolEvent::Reply {
        ok,
        ref_id: None,
        text: text.to_string(),
    })
}

/// `FROM {displayName} IS {text}`
fn decode_from_is(rest: &str, verb: &'static str) -> Result<(String, String), CodecError> {
    let mut parts = rest.splitn(4, ' ');
    if parts.next() != Some("FROM") {
        return Err(CodecError::Malformed(verb));
    }
    let from = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(CodecError::Malformed(verb)),
    };
    if parts.next() != Some("IS") {
        return Err(CodecError::Malformed(verb));
    }
    let text = parts.next().ok_or(CodecError::Malformed(verb))?;
    Ok((from.to_string(), text.to_string()))
}
