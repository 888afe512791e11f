/*
 * seed.rs
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

//! Seed records: a seed is a user-controlled address subscribed to
//! newsletters, with the IMAP connection settings needed to pull its
//! mailbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Mailbox provider for a seed. Known providers carry an IMAP host
/// default; custom ones must configure the host themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Gmail,
    Outlook,
    Yahoo,
    ImapCustom,
}

impl Provider {
    /// Default IMAP host for well-known providers.
    pub fn default_host(&self) -> Option<&'static str> {
        match self {
            Provider::Gmail => Some("imap.gmail.com"),
            Provider::Outlook => Some("outlook.office365.com"),
            Provider::Yahoo => Some("imap.mail.yahoo.com"),
            Provider::ImapCustom => None,
        }
    }
}

/// One tracked mailbox, as stored in the seed registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    pub id: String,
    /// Owning user; syncs from anyone else are rejected before any
    /// socket is opened.
    pub user_id: String,
    pub email: String,
    pub provider: Provider,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub use_ssl: Option<bool>,
    pub encrypted_password: Option<String>,
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Registry of seeds (backed by the service database elsewhere).
#[allow(async_fn_in_trait)]
pub trait SeedRegistry {
    /// Look up a seed by id.
    async fn seed(&self, id: &str) -> Result<Option<Seed>, StoreError>;
    /// Replace the stored credential for a seed.
    async fn update_password(&self, id: &str, password: &str) -> Result<(), StoreError>;
    /// Record a completed sync.
    async fn touch_last_sync(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_round_trips_through_serde_with_timestamp() {
        let seed = Seed {
            id: "seed-1".to_string(),
            user_id: "user-1".to_string(),
            email: "seed1@tracked.example".to_string(),
            provider: Provider::ImapCustom,
            imap_host: Some("mail.example.org".to_string()),
            imap_port: Some(143),
            use_ssl: Some(false),
            encrypted_password: None,
            is_active: true,
            last_sync_at: Some("2026-08-25T12:00:00Z".parse().unwrap()),
        };
        let json = serde_json::to_string(&seed).unwrap();
        assert!(json.contains("\"imap_custom\""));
        assert!(json.contains("2026-08-25T12:00:00Z"));
        let back: Seed = serde_json::from_str(&json).unwrap();
        assert_eq!(back.provider, Provider::ImapCustom);
        assert_eq!(back.last_sync_at, seed.last_sync_at);
    }
}
