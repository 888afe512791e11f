/*
 * client.rs
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

//! IMAP client transport and command layer: tag generation, CRLF line
//! framing over arbitrary read chunks, and the LOGIN/SELECT/SEARCH/FETCH
//! command set. Strictly one command in flight; the tagged completion
//! line ends every exchange.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::net::{PlainStream, TlsStream};
use crate::protocol::imap::fetch::parse_fetch_response;
use crate::protocol::imap::{EmailMessage, Mailbox};

/// IMAP client error (network or protocol).
#[derive(Debug)]
pub struct ImapError {
    pub message: String,
}

impl ImapError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for ImapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ImapError {}

impl From<io::Error> for ImapError {
    fn from(e: io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Pop one complete CRLF-terminated line off the front of the buffer.
/// Leaves any bytes of the next, not-yet-complete response in place.
/// Decoding happens here, on whole lines only, so a multi-byte character
/// split across read chunks is never decoded in halves.
fn pop_line(buf: &mut Vec<u8>) -> Option<String> {
    let end = buf.windows(2).position(|w| w == b"\r\n")?;
    let line = String::from_utf8_lossy(&buf[..end]).to_string();
    buf.drain(..end + 2);
    Some(line)
}

/// Sequential IMAP session over one stream. Owns the socket, the receive
/// buffer, and the tag counter; none of it is shared or reused.
pub struct ImapClient<S> {
    stream: S,
    /// Raw bytes read off the socket and not yet consumed as lines.
    read_buf: Vec<u8>,
    tag_counter: u32,
    closed: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ImapClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: Vec::new(),
            tag_counter: 0,
            closed: false,
        }
    }

    /// Next command tag: A0001, A0002, ... Strictly increasing for the
    /// lifetime of this client, never reused.
    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{:04}", self.tag_counter)
    }

    /// Read a chunk from the stream into the receive buffer. Bytes stay
    /// undecoded until a complete line is popped.
    async fn fill(&mut self) -> Result<(), ImapError> {
        let mut chunk = [0u8; 4096];
        let n = self.stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ImapError::new("connection closed"));
        }
        self.read_buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, ImapError> {
        loop {
            if let Some(line) = pop_line(&mut self.read_buf) {
                return Ok(line);
            }
            self.fill().await?;
        }
    }

    /// Consume the server's untagged greeting. Must be the first read on
    /// a fresh connection.
    pub async fn read_greeting(&mut self) -> Result<String, ImapError> {
        self.read_line().await
    }

    /// Collect response lines until the tagged completion line, which is
    /// included as the last element. Untagged lines interleave freely
    /// before it; callers scan the whole list.
    async fn read_response(&mut self, tag: &str) -> Result<Vec<String>, ImapError> {
        let done = format!("{} ", tag);
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            let finished = line.starts_with(&done);
            lines.push(line);
            if finished {
                return Ok(lines);
            }
        }
    }

    async fn send_command(&mut self, command: &str) -> Result<Vec<String>, ImapError> {
        let tag = self.next_tag();
        let full = format!("{} {}\r\n", tag, command);
        self.stream.write_all(full.as_bytes()).await?;
        self.stream.flush().await?;
        self.read_response(&tag).await
    }

    /// LOGIN with credentials quoted verbatim (embedded quotes are not
    /// escaped). Rejection is reported as `false`, never as an error.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<bool, ImapError> {
        let lines = self
            .send_command(&format!("LOGIN \"{}\" \"{}\"", email, password))
            .await?;
        Ok(lines.last().map(|l| l.contains(" OK ")).unwrap_or(false))
    }

    /// SELECT a mailbox and return the `* <n> EXISTS` count, wherever it
    /// appears among the untagged lines. 0 when absent or unparsable.
    pub async fn select_mailbox(&mut self, mailbox: &str) -> Result<u32, ImapError> {
        let lines = self.send_command(&format!("SELECT \"{}\"", mailbox)).await?;
        for line in &lines {
            if let Some(rest) = line.strip_prefix("* ") {
                if let Some(count) = rest.strip_suffix(" EXISTS") {
                    if let Ok(n) = count.trim().parse() {
                        return Ok(n);
                    }
                }
            }
        }
        Ok(0)
    }

    /// SEARCH UNSEEN, returning the ids from the `* SEARCH` line.
    pub async fn search_unseen(&mut self) -> Result<Vec<String>, ImapError> {
        let lines = self.send_command("SEARCH UNSEEN").await?;
        for line in &lines {
            if let Some(rest) = line.strip_prefix("* SEARCH") {
                return Ok(rest.split_whitespace().map(|s| s.to_string()).collect());
            }
        }
        Ok(Vec::new())
    }

    /// FETCH envelope, body text and the headers we care about for one
    /// message, parsed best-effort. A response that does not parse yields
    /// `None`; the sync loop skips the uid and carries on.
    pub async fn fetch_message(&mut self, uid: &str) -> Result<Option<EmailMessage>, ImapError> {
        let lines = self
            .send_command(&format!(
                "FETCH {} (ENVELOPE BODY[TEXT] BODY[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TYPE)])",
                uid
            ))
            .await?;
        // Drop the tagged completion line; the parser sees only response data.
        let data = &lines[..lines.len().saturating_sub(1)];
        let text = data.join("\r\n");
        match parse_fetch_response(uid, &text) {
            Some(message) => Ok(Some(message)),
            None => {
                log::warn!("fetch {}: response did not parse, skipping", uid);
                Ok(None)
            }
        }
    }

    /// Best-effort LOGOUT. The session is ending either way.
    pub async fn logout(&mut self) {
        let _ = self.send_command("LOGOUT").await;
    }

    /// Release the socket. Idempotent; shutdown errors are swallowed.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.stream.shutdown().await;
    }
}

/// An established IMAP session, plain or TLS per the seed's config.
pub enum ImapConnection {
    Plain(ImapClient<PlainStream>),
    Tls(ImapClient<TlsStream>),
}

impl ImapConnection {
    /// Open the socket and consume the greeting. Socket or TLS setup
    /// failure is fatal for the sync attempt.
    pub async fn connect(host: &str, port: u16, use_tls: bool) -> Result<Self, ImapError> {
        if use_tls {
            let mut client = ImapClient::new(TlsStream::connect(host, port).await?);
            let greeting = client.read_greeting().await?;
            log::debug!("imap {}:{} greeting: {}", host, port, greeting);
            Ok(Self::Tls(client))
        } else {
            let mut client = ImapClient::new(PlainStream::connect(host, port).await?);
            let greeting = client.read_greeting().await?;
            log::debug!("imap {}:{} greeting: {}", host, port, greeting);
            Ok(Self::Plain(client))
        }
    }
}

impl Mailbox for ImapConnection {
    async fn login(&mut self, email: &str, password: &str) -> Result<bool, ImapError> {
        match self {
            Self::Plain(c) => c.login(email, password).await,
            Self::Tls(c) => c.login(email, password).await,
        }
    }

    async fn select_mailbox(&mut self, mailbox: &str) -> Result<u32, ImapError> {
        match self {
            Self::Plain(c) => c.select_mailbox(mailbox).await,
            Self::Tls(c) => c.select_mailbox(mailbox).await,
        }
    }

    async fn search_unseen(&mut self) -> Result<Vec<String>, ImapError> {
        match self {
            Self::Plain(c) => c.search_unseen().await,
            Self::Tls(c) => c.search_unseen().await,
        }
    }

    async fn fetch_message(&mut self, uid: &str) -> Result<Option<EmailMessage>, ImapError> {
        match self {
            Self::Plain(c) => c.fetch_message(uid).await,
            Self::Tls(c) => c.fetch_message(uid).await,
        }
    }

    async fn logout(&mut self) {
        match self {
            Self::Plain(c) => c.logout().await,
            Self::Tls(c) => c.logout().await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Plain(c) => c.close().await,
            Self::Tls(c) => c.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Stream double that serves reads from scripted chunks (preserving
    /// the scripted boundaries) and records writes and shutdowns.
    struct ScriptedStream {
        chunks: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        shutdowns: u32,
    }

    impl ScriptedStream {
        fn new<I: IntoIterator<Item = &'static str>>(chunks: I) -> Self {
            Self::from_chunks(chunks.into_iter().map(|c| c.as_bytes().to_vec()))
        }

        fn from_chunks<I: IntoIterator<Item = Vec<u8>>>(chunks: I) -> Self {
            Self {
                chunks: chunks.into_iter().collect(),
                written: Vec::new(),
                shutdowns: 0,
            }
        }

        fn written_text(&self) -> String {
            String::from_utf8_lossy(&self.written).to_string()
        }
    }

    impl AsyncRead for ScriptedStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            if let Some(chunk) = this.chunks.pop_front() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    this.chunks.push_front(chunk[n..].to_vec());
                }
            }
            // An exhausted script reads as EOF.
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for ScriptedStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.get_mut().written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.get_mut().shutdowns += 1;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn tags_are_sequential_and_unique() {
        let stream = ScriptedStream::new([
            "A0001 OK NOOP completed\r\n",
            "A0002 OK NOOP completed\r\n",
            "A0003 OK NOOP completed\r\n",
        ]);
        let mut client = ImapClient::new(stream);
        for _ in 0..3 {
            client.send_command("NOOP").await.unwrap();
        }
        assert_eq!(
            client.stream.written_text(),
            "A0001 NOOP\r\nA0002 NOOP\r\nA0003 NOOP\r\n"
        );
    }

    #[tokio::test]
    async fn framing_is_invariant_under_chunking() {
        let response = "* 3 EXISTS\r\n* OK [UNSEEN 2]\r\nA0001 OK SELECT completed\r\n";
        let expected = vec![
            "* 3 EXISTS".to_string(),
            "* OK [UNSEEN 2]".to_string(),
            "A0001 OK SELECT completed".to_string(),
        ];
        // Every two-way split of the response, including ones that cut a
        // CRLF in half, must frame identically.
        for split in 1..response.len() {
            let stream = ScriptedStream::new([&response[..split], &response[split..]]);
            let mut client = ImapClient::new(stream);
            let lines = client.read_response("A0001").await.unwrap();
            assert_eq!(lines, expected, "split at {}", split);
        }
    }

    #[tokio::test]
    async fn leftover_bytes_stay_buffered_for_the_next_response() {
        let stream = ScriptedStream::new(["A0001 OK done\r\n* 5 EXI"]);
        let mut client = ImapClient::new(stream);
        let lines = client.send_command("NOOP").await.unwrap();
        assert_eq!(lines, vec!["A0001 OK done".to_string()]);
        assert_eq!(client.read_buf, b"* 5 EXI");
    }

    #[tokio::test]
    async fn multibyte_text_survives_any_chunk_split() {
        // Byte-level splits land inside the two-byte characters as well
        // as inside CRLFs; the decoded lines must come out identical.
        let response = "* 1 FETCH (Subject: Caffè corretto)\r\nA0001 OK FETCH completed\r\n";
        let bytes = response.as_bytes();
        let expected = vec![
            "* 1 FETCH (Subject: Caffè corretto)".to_string(),
            "A0001 OK FETCH completed".to_string(),
        ];
        for split in 1..bytes.len() {
            let stream = ScriptedStream::from_chunks([
                bytes[..split].to_vec(),
                bytes[split..].to_vec(),
            ]);
            let mut client = ImapClient::new(stream);
            let lines = client.read_response("A0001").await.unwrap();
            assert_eq!(lines, expected, "split at byte {}", split);
        }
    }

    #[tokio::test]
    async fn login_ok_maps_to_true() {
        let stream = ScriptedStream::new(["A0001 OK LOGIN completed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert!(client.login("user@example.com", "secret").await.unwrap());
        assert_eq!(
            client.stream.written_text(),
            "A0001 LOGIN \"user@example.com\" \"secret\"\r\n"
        );
    }

    #[tokio::test]
    async fn login_no_maps_to_false_without_error() {
        let stream = ScriptedStream::new(["A0001 NO LOGIN failed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert!(!client.login("user@example.com", "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn select_finds_exists_among_untagged_lines() {
        let stream = ScriptedStream::new([
            "* 1 RECENT\r\n* FLAGS (\\Seen \\Deleted)\r\n* 12 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n",
        ]);
        let mut client = ImapClient::new(stream);
        assert_eq!(client.select_mailbox("INBOX").await.unwrap(), 12);
    }

    #[tokio::test]
    async fn select_zero_exists_parses_as_zero() {
        let stream =
            ScriptedStream::new(["* 0 EXISTS\r\n* 1 RECENT\r\nA0001 OK SELECT completed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert_eq!(client.select_mailbox("INBOX").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn select_without_exists_defaults_to_zero() {
        let stream = ScriptedStream::new(["* 1 RECENT\r\nA0001 OK SELECT completed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert_eq!(client.select_mailbox("INBOX").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_unseen_collects_ids() {
        let stream = ScriptedStream::new(["* SEARCH 4 8 15\r\nA0001 OK SEARCH completed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert_eq!(client.search_unseen().await.unwrap(), vec!["4", "8", "15"]);
    }

    #[tokio::test]
    async fn search_unseen_empty_result() {
        let stream = ScriptedStream::new(["* SEARCH\r\nA0001 OK SEARCH completed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert!(client.search_unseen().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_message_parses_headers_and_body() {
        let stream = ScriptedStream::new([
            "* 2 FETCH (BODY[HEADER.FIELDS (FROM SUBJECT DATE CONTENT-TYPE)] {118}\r\n\
             From: \"Jane Doe\" <jane@example.com>\r\n\
             Subject: Weekly digest\r\n\
             Date: Tue, 12 Aug 2025 10:00:00 +0000\r\n\
             Content-Type: text/html\r\n\
             \r\n\
             BODY[TEXT] {34}\r\n\
             <div>Hello from the newsletter</div>\r\n)\r\n\
             A0001 OK FETCH completed\r\n",
        ]);
        let mut client = ImapClient::new(stream);
        let message = client.fetch_message("2").await.unwrap().unwrap();
        assert_eq!(message.uid, "2");
        assert_eq!(message.from, "jane@example.com");
        assert_eq!(message.from_name.as_deref(), Some("Jane Doe"));
        assert_eq!(message.subject, "Weekly digest");
        assert!(message
            .html_content
            .as_deref()
            .unwrap()
            .contains("<div>Hello from the newsletter</div>"));
        assert!(message.text_content.is_none());
    }

    #[tokio::test]
    async fn fetch_without_data_yields_none() {
        let stream = ScriptedStream::new(["A0001 OK FETCH completed\r\n"]);
        let mut client = ImapClient::new(stream);
        assert!(client.fetch_message("7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_shuts_the_stream_down_exactly_once() {
        let stream = ScriptedStream::new([]);
        let mut client = ImapClient::new(stream);
        client.close().await;
        client.close().await;
        assert_eq!(client.stream.shutdowns, 1);
    }

    #[tokio::test]
    async fn logout_swallows_transport_errors() {
        // Empty script means the read after LOGOUT hits EOF; logout must
        // not surface that.
        let stream = ScriptedStream::new([]);
        let mut client = ImapClient::new(stream);
        client.logout().await;
        assert_eq!(client.stream.written_text(), "A0001 LOGOUT\r\n");
    }
}
