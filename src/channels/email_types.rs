//! Inbound email parsing: sender address, subject, plain-text body.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders, PartType};
use regex::Regex;

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(.+?)>").expect("static regex"));

/// A reply pulled from the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEmail {
    /// Message-ID header, if any.
    pub message_id: Option<String>,
    /// Bare sender address used for tracker lookups.
    pub sender: String,
    pub subject: String,
    /// First `text/plain` part, or the single payload.
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// Bare address from a `From` header value.
///
/// `Name <addr>` yields `addr`; anything without angle brackets is returned
/// trimmed, as-is.
pub fn extract_sender_address(from_header: &str) -> String {
    match ANGLE_ADDRESS.captures(from_header) {
        Some(caps) => caps[1].trim().to_string(),
        None => from_header.trim().to_string(),
    }
}

/// Parse a raw RFC-822 message. Returns `None` if it has no usable headers.
pub fn parse_inbound(raw: &[u8]) -> Option<InboundEmail> {
    let parsed = MessageParser::default().parse(raw)?;

    let from_raw = parsed
        .header_raw("From")
        .map(unfold_header)
        .or_else(|| {
            parsed
                .from()
                .and_then(|addr| addr.first())
                .and_then(|a| a.address())
                .map(|s| s.to_string())
        })?;

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Some(InboundEmail {
        message_id: parsed.message_id().map(|s| s.to_string()),
        sender: extract_sender_address(&from_raw),
        subject: parsed.subject().unwrap_or_default().to_string(),
        body: extract_plain_body(&parsed),
        received_at,
    })
}

/// Join folded header lines into one.
fn unfold_header(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_plain_text(part: &mail_parser::MessagePart) -> bool {
    match MimeHeaders::content_type(part) {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().is_some_and(|s| s.eq_ignore_ascii_case("plain"))
        }
        None => matches!(part.body, PartType::Text(_)),
    }
}

fn part_text(part: &mail_parser::MessagePart) -> String {
    match part.text_contents() {
        Some(text) => text.to_string(),
        None => String::from_utf8_lossy(part.contents()).into_owned(),
    }
}

/// First `text/plain` part of a multipart message, else the single payload.
///
/// A multipart message with no plain-text part yields an empty body.
fn extract_plain_body(parsed: &mail_parser::Message) -> String {
    let root = parsed.root_part();
    if matches!(root.body, PartType::Multipart(_)) {
        return parsed
            .parts
            .iter()
            .find(|p| is_plain_text(p))
            .map(part_text)
            .unwrap_or_default();
    }
    part_text(root)
}
