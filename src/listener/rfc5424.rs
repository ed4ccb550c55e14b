//! RFC 5424 syslog message parsing.
//!
//! `<PRI>VERSION TIMESTAMP HOSTNAME APP-NAME PROCID MSGID SD [MSG]`

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::record::{facility_name, severity_level, IngestionRecord};

const NIL: &str = "-";
const BOM: char = '\u{feff}';

/// Errors that can occur while parsing a syslog message.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty message")]
    Empty,

    #[error("invalid priority")]
    InvalidPriority,

    #[error("unsupported version {0:?}")]
    InvalidVersion(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("malformed structured data")]
    InvalidStructuredData,
}

/// Parses one syslog message. A nil timestamp is replaced by `received`.
pub fn parse(message: &str, received: DateTime<Utc>) -> Result<IngestionRecord, ParseError> {
    let message = message.trim_end_matches(['\r', '\n']);
    if message.is_empty() {
        return Err(ParseError::Empty);
    }

    let (pri, mut rest) = parse_priority(message)?;

    let version = next_field(&mut rest, "version")?;
    if version != "1" {
        return Err(ParseError::InvalidVersion(version.to_string()));
    }

    let timestamp = next_field(&mut rest, "timestamp")?;
    let time = if timestamp == NIL {
        received
    } else {
        DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| ParseError::InvalidTimestamp(timestamp.to_string()))?
            .with_timezone(&Utc)
    };

    let hostname = nil_to_empty(next_field(&mut rest, "hostname")?);
    let app_name = nil_to_empty(next_field(&mut rest, "app name")?);
    let proc_id = nil_to_empty(next_field(&mut rest, "proc id")?);
    let _msg_id = next_field(&mut rest, "msg id")?;

    let msg = skip_structured_data(rest)?;
    let msg = msg.strip_prefix(BOM).unwrap_or(msg);

    Ok(IngestionRecord {
        time,
        level: severity_level(pri % 8).to_string(),
        tag: app_name.to_string(),
        pid: proc_id.to_string(),
        hostname: hostname.to_string(),
        facility: facility_name(pri / 8).to_string(),
        msg: msg.trim_matches(' ').to_string(),
    })
}

/// Parses `<N>` with N in 0..=191 and returns the remainder.
fn parse_priority(message: &str) -> Result<(u8, &str), ParseError> {
    let inner = message
        .strip_prefix('<')
        .ok_or(ParseError::InvalidPriority)?;
    let close = inner.find('>').ok_or(ParseError::InvalidPriority)?;
    let digits = &inner[..close];

    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidPriority);
    }
    let pri: u8 = digits.parse().map_err(|_| ParseError::InvalidPriority)?;
    if pri > 191 {
        return Err(ParseError::InvalidPriority);
    }

    Ok((pri, &inner[close + 1..]))
}

/// Takes the next space-terminated header field.
fn next_field<'a>(rest: &mut &'a str, name: &'static str) -> Result<&'a str, ParseError> {
    let (field, tail) = rest.split_once(' ').ok_or(ParseError::MissingField(name))?;
    if field.is_empty() {
        return Err(ParseError::MissingField(name));
    }
    *rest = tail;
    Ok(field)
}

fn nil_to_empty(field: &str) -> &str {
    if field == NIL {
        ""
    } else {
        field
    }
}

/// Skips the structured data section and returns the message that follows.
fn skip_structured_data(sd: &str) -> Result<&str, ParseError> {
    if let Some(tail) = sd.strip_prefix(NIL) {
        return message_after(tail);
    }
    if !sd.starts_with('[') {
        return Err(ParseError::InvalidStructuredData);
    }

    let bytes = sd.as_bytes();
    let mut pos = 0;

    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
        let mut in_quotes = false;
        loop {
            match bytes.get(pos) {
                None => return Err(ParseError::InvalidStructuredData),
                Some(b'\\') if in_quotes => pos += 2,
                Some(b'"') => {
                    in_quotes = !in_quotes;
                    pos += 1;
                }
                Some(b']') if !in_quotes => {
                    pos += 1;
                    break;
                }
                Some(_) => pos += 1,
            }
        }
    }

    // `pos` always lands right after an ASCII `]`.
    message_after(&sd[pos..])
}

fn message_after(tail: &str) -> Result<&str, ParseError> {
    if tail.is_empty() {
        return Ok("");
    }
    tail.strip_prefix(' ')
        .ok_or(ParseError::InvalidStructuredData)
}
