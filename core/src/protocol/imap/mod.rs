/*
 * mod.rs
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

//! Minimal IMAP4 client for pulling unseen newsletters out of a user's
//! INBOX: LOGIN, SELECT, SEARCH UNSEEN, FETCH, LOGOUT. One client
//! instance is one TCP/TLS session is one sync attempt; there is no
//! connection reuse, IDLE, or MIME tree decoding.

mod client;
mod fetch;

pub use client::{ImapClient, ImapConnection, ImapError};

use chrono::{DateTime, Utc};

/// A message pulled from the mailbox, as far as best-effort parsing gets.
/// Immutable once constructed; persistence is the sync loop's job.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Server-assigned id, stable only within this session (UIDVALIDITY is
    /// not checked).
    pub uid: String,
    /// Bare address from the From header; empty when unparsable.
    pub from: String,
    /// Display name from the From header, when present.
    pub from_name: Option<String>,
    /// Subject with folding unwrapped. Encoded-words are left as-is.
    pub subject: String,
    /// Date header, or the fetch time when the header does not parse.
    pub date: DateTime<Utc>,
    /// Set when the body carries HTML markers; exclusive with `text_content`.
    pub html_content: Option<String>,
    pub text_content: Option<String>,
}

/// The mailbox operations the sync loop drives, as a seam so the
/// orchestrator can be exercised against a scripted double.
#[allow(async_fn_in_trait)]
pub trait Mailbox {
    /// LOGIN with the given credentials. `Ok(false)` means the server
    /// rejected them; transport failures are the only errors.
    async fn login(&mut self, email: &str, password: &str) -> Result<bool, ImapError>;
    /// SELECT a mailbox, returning the EXISTS count (0 when absent).
    async fn select_mailbox(&mut self, mailbox: &str) -> Result<u32, ImapError>;
    /// SEARCH UNSEEN, returning message ids as the server sent them.
    async fn search_unseen(&mut self) -> Result<Vec<String>, ImapError>;
    /// FETCH one message. `Ok(None)` when the response does not parse;
    /// the caller skips that uid and moves on.
    async fn fetch_message(&mut self, uid: &str) -> Result<Option<EmailMessage>, ImapError>;
    /// Best-effort LOGOUT; errors are swallowed.
    async fn logout(&mut self);
    /// Release the socket. Safe to call on any exit path, once is enough.
    async fn close(&mut self);
}
