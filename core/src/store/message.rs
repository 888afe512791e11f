/*
 * message.rs
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

//! Captured-newsletter records handed to the message store.

use serde::Serialize;

use crate::protocol::imap::EmailMessage;
use crate::store::StoreError;

/// One newsletter insert, one per successfully fetched message.
#[derive(Debug, Clone, Serialize)]
pub struct NewsletterInsert {
    pub seed_id: String,
    pub from_email: String,
    pub from_name: Option<String>,
    pub subject: String,
    /// ISO-8601 timestamp from the message's Date header.
    pub received_at: String,
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    pub is_processed: bool,
}

impl NewsletterInsert {
    /// Build the insert record for a fetched message. Classification and
    /// header parsing already happened on the IMAP side; this is a
    /// straight mapping plus timestamp formatting.
    pub fn from_message(seed_id: &str, message: &EmailMessage) -> Self {
        Self {
            seed_id: seed_id.to_string(),
            from_email: message.from.clone(),
            from_name: message.from_name.clone(),
            subject: message.subject.clone(),
            received_at: message.date.to_rfc3339(),
            html_content: message.html_content.clone(),
            text_content: message.text_content.clone(),
            is_processed: false,
        }
    }
}

/// Sink for captured newsletters (backed by the service database
/// elsewhere). Inserts are independent; a failed insert only costs that
/// one message.
#[allow(async_fn_in_trait)]
pub trait MessageStore {
    async fn insert_newsletter(&self, message: &NewsletterInsert) -> Result<(), StoreError>;
}
