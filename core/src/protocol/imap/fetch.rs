/*
 * fetch.rs
 * Copyright (C) 2026 Letterseed developers
 *
 * This file is part of Letterseed, a newsletter-tracking service.
 *
 * Letterseed is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Letterseed is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Letterseed.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Best-effort parsing of FETCH response text into an EmailMessage.
//!
//! This is deliberately not a literal-length-aware IMAP tokenizer: header
//! values are pulled out of the flattened response by line scanning, the
//! `{n}` body literal length is advisory only, and there is no charset or
//! encoded-word decoding. A message is never dropped for an unparsable
//! header; only a response with no FETCH data at all yields nothing.

use chrono::{DateTime, Utc};

use crate::protocol::imap::EmailMessage;

/// Markers that classify a fetched body as HTML.
const HTML_MARKERS: [&str; 3] = ["<html", "<body", "<div"];

/// Parse the untagged portion of a FETCH response. Returns None only when
/// the response carries no FETCH data for this uid.
pub(crate) fn parse_fetch_response(uid: &str, text: &str) -> Option<EmailMessage> {
    if !text.contains("FETCH") {
        return None;
    }
    let (from, from_name) = parse_from(text);
    let subject = parse_subject(text);
    let date = parse_date(text);
    let (html_content, text_content) = match extract_body(text) {
        Some(body) => classify_body(&body),
        None => (None, None),
    };
    Some(EmailMessage {
        uid: uid.to_string(),
        from,
        from_name,
        subject,
        date,
        html_content,
        text_content,
    })
}

/// Find a header line by name (case-insensitive) and return its value
/// with folded continuation lines unwrapped.
///
/// The scan covers the whole flattened response, headers and body alike;
/// when the real header is absent, a body line that starts with the
/// header name can match instead. Section order in FETCH responses is
/// server-chosen, so the scan cannot be anchored to one side of the
/// BODY[TEXT] marker.
fn header_value(text: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in text.lines() {
        match value {
            None => {
                if let Some(prefix) = line.get(..name.len()) {
                    if prefix.eq_ignore_ascii_case(name) {
                        value = Some(line[name.len()..].trim().to_string());
                    }
                }
            }
            Some(ref mut v) => {
                if line.starts_with(' ') || line.starts_with('\t') {
                    v.push(' ');
                    v.push_str(line.trim());
                } else {
                    break;
                }
            }
        }
    }
    value
}

/// From header: optional (possibly quoted) display name followed by an
/// angle-bracketed or bare address. No match yields an empty address.
fn parse_from(text: &str) -> (String, Option<String>) {
    let value = match header_value(text, "From:") {
        Some(v) => v,
        None => return (String::new(), None),
    };
    if let Some(open) = value.find('<') {
        let address = value[open + 1..]
            .split('>')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        let name = value[..open].trim().trim_matches('"').trim().to_string();
        let name = if name.is_empty() { None } else { Some(name) };
        return (address, name);
    }
    let address = value
        .split_whitespace()
        .find(|token| token.contains('@'))
        .unwrap_or("")
        .to_string();
    (address, None)
}

/// Subject with fold whitespace collapsed to single spaces.
fn parse_subject(text: &str) -> String {
    match header_value(text, "Subject:") {
        Some(v) => v.split_whitespace().collect::<Vec<_>>().join(" "),
        None => String::new(),
    }
}

/// Date header as RFC 2822; anything unparsable becomes "now" rather
/// than dropping the message.
fn parse_date(text: &str) -> DateTime<Utc> {
    header_value(text, "Date:")
        .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Body content: everything after the `{n}` literal marker that follows
/// BODY[TEXT]. The declared length is not enforced; trailing response
/// framing (closing paren) is trimmed instead.
fn extract_body(text: &str) -> Option<String> {
    let at = text.find("BODY[TEXT]")?;
    let rest = &text[at + "BODY[TEXT]".len()..];
    let open = rest.find('{')?;
    let close = open + rest[open..].find('}')?;
    let mut body = rest[close + 1..].trim_start_matches("\r\n").trim_end();
    if let Some(stripped) = body.strip_suffix(')') {
        body = stripped.trim_end();
    }
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// HTML when any marker appears anywhere in the body, text otherwise.
/// Exactly one side is populated.
fn classify_body(body: &str) -> (Option<String>, Option<String>) {
    let lowered = body.to_ascii_lowercase();
    if HTML_MARKERS.iter().any(|m| lowered.contains(m)) {
        (Some(body.to_string()), None)
    } else {
        (None, Some(body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn from_with_quoted_display_name() {
        let text = "From: \"Jane Doe\" <jane@example.com>\r\n";
        let (address, name) = parse_from(text);
        assert_eq!(address, "jane@example.com");
        assert_eq!(name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn from_bare_address_has_no_name() {
        let (address, name) = parse_from("From: jane@example.com\r\n");
        assert_eq!(address, "jane@example.com");
        assert!(name.is_none());
    }

    #[test]
    fn from_unquoted_display_name() {
        let (address, name) = parse_from("From: Jane Doe <jane@example.com>\r\n");
        assert_eq!(address, "jane@example.com");
        assert_eq!(name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn body_line_can_stand_in_for_a_missing_header() {
        // Best-effort line scan: with no real Subject header, a body line
        // that looks like one is taken.
        let text = "BODY[TEXT] {26}\r\nSubject: seen in the body\r\n";
        assert_eq!(parse_subject(text), "seen in the body");
    }

    #[test]
    fn missing_from_yields_empty_address() {
        let (address, name) = parse_from("Subject: hi\r\n");
        assert_eq!(address, "");
        assert!(name.is_none());
    }

    #[test]
    fn folded_subject_is_unwrapped() {
        let text = "Subject: Weekly digest of\r\n  everything you missed\r\nDate: x\r\n";
        assert_eq!(
            parse_subject(text),
            "Weekly digest of everything you missed"
        );
    }

    #[test]
    fn garbage_date_falls_back_to_now() {
        let before = Utc::now();
        let parsed = parse_date("Date: not a date at all\r\n");
        let after = Utc::now();
        assert!(parsed >= before && parsed <= after);
    }

    #[test]
    fn valid_rfc2822_date_is_kept() {
        let parsed = parse_date("Date: Tue, 12 Aug 2025 10:00:00 +0200\r\n");
        assert_eq!(parsed.to_rfc3339(), "2025-08-12T08:00:00+00:00");
    }

    #[test]
    fn body_with_div_classifies_as_html() {
        let (html, text) = classify_body("hello <div>world</div>");
        assert!(html.is_some());
        assert!(text.is_none());
    }

    #[test]
    fn plain_body_classifies_as_text() {
        let (html, text) = classify_body("just words, no markup");
        assert!(html.is_none());
        assert_eq!(text.as_deref(), Some("just words, no markup"));
    }

    #[test]
    fn body_literal_marker_is_advisory() {
        // Declared length is wrong on purpose; everything after the brace
        // is still taken.
        let text = "* 1 FETCH (BODY[TEXT] {3}\r\nplain newsletter text\r\n)";
        assert_eq!(extract_body(text).as_deref(), Some("plain newsletter text"));
    }

    #[test]
    fn response_without_fetch_data_is_none() {
        assert!(parse_fetch_response("9", "* OK still here").is_none());
    }

    #[test]
    fn fetch_response_builds_message() {
        let text = "* 3 FETCH (BODY[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TYPE)] {64}\r\n\
                    From: news@letters.example\r\n\
                    Subject: Hello\r\n\
                    \r\n\
                    BODY[TEXT] {5}\r\nHello\r\n)";
        let message = parse_fetch_response("3", text).unwrap();
        assert_eq!(message.uid, "3");
        assert_eq!(message.from, "news@letters.example");
        assert_eq!(message.subject, "Hello");
        assert_eq!(message.text_content.as_deref(), Some("Hello"));
        assert!(message.html_content.is_none());
    }
}
