/*
 * sync.rs
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

//! Sync orchestrator: one invocation pulls one seed's mailbox. Resolves
//! connection settings from the seed record, drives the IMAP client
//! through login/select/search/fetch, persists what it got, and always
//! releases the socket. Per-message failures only reduce the synced
//! count; connectivity, auth, and config failures abort the attempt.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::protocol::imap::{ImapConnection, ImapError, Mailbox};
use crate::store::{MessageStore, NewsletterInsert, Seed, SeedRegistry};

/// Fetch ceiling per sync invocation. Bounds wall-clock time per run;
/// unfetched unseen messages are picked up by the next sync.
pub const MAX_MESSAGES_PER_SYNC: usize = 20;

/// HTTP-triggered sync request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub seed_id: String,
    /// Replacement credential; stored before connecting when it differs
    /// from the registry's copy.
    #[serde(default)]
    pub password: Option<String>,
}

/// Successful sync summary, serialized as the response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub synced_count: u32,
    pub total_unseen: u32,
    pub details: SyncDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDetails {
    pub host: String,
    pub port: u16,
    pub email: String,
    pub last_sync: String,
}

/// Fatal sync failures. Distinct variants so the dashboard can tell
/// "fix your credentials" from "the network is down" from "fix the seed
/// config".
#[derive(Debug)]
pub enum SyncError {
    SeedNotFound(String),
    /// The seed belongs to a different user; checked before any I/O.
    Forbidden,
    Configuration(String),
    Connectivity(String),
    /// The server rejected LOGIN. Not a network error; retrying without
    /// new credentials is pointless.
    Authentication,
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::SeedNotFound(id) => write!(f, "seed {} not found", id),
            SyncError::Forbidden => write!(f, "seed does not belong to the caller"),
            SyncError::Configuration(msg) => write!(f, "{}", msg),
            SyncError::Connectivity(msg) => write!(f, "{}", msg),
            SyncError::Authentication => {
                write!(f, "IMAP login failed; check the mailbox credentials")
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    /// Status code for the HTTP response wrapping this error.
    pub fn http_status(&self) -> u16 {
        match self {
            SyncError::SeedNotFound(_) => 404,
            SyncError::Forbidden => 403,
            SyncError::Configuration(_) => 400,
            SyncError::Authentication => 401,
            SyncError::Connectivity(_) => 502,
        }
    }

    /// Error response body: `{ "error": "<message>" }`.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Resolved connection settings for a seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Resolve host/port/TLS from the seed record, falling back to the
/// provider's defaults. A custom provider with no host is a hard
/// configuration error.
pub fn resolve_endpoint(seed: &Seed) -> Result<Endpoint, SyncError> {
    let host = seed
        .imap_host
        .clone()
        .filter(|h| !h.is_empty())
        .or_else(|| seed.provider.default_host().map(str::to_string))
        .ok_or_else(|| SyncError::Configuration("IMAP host not configured".to_string()))?;
    Ok(Endpoint {
        host,
        port: seed.imap_port.unwrap_or(993),
        use_tls: seed.use_ssl.unwrap_or(true),
    })
}

/// Opens mailbox sessions. A seam over `ImapConnection::connect` so the
/// orchestrator can be driven against scripted sessions in tests.
#[allow(async_fn_in_trait)]
pub trait MailboxConnector {
    type Session: Mailbox;
    async fn connect(&self, host: &str, port: u16, use_tls: bool)
        -> Result<Self::Session, ImapError>;
}

/// Production connector: raw TCP or implicit TLS per the endpoint.
pub struct ImapConnector;

impl MailboxConnector for ImapConnector {
    type Session = ImapConnection;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        use_tls: bool,
    ) -> Result<Self::Session, ImapError> {
        ImapConnection::connect(host, port, use_tls).await
    }
}

/// Run one sync for one seed. `caller_user_id` is the authenticated user
/// behind the request; ownership is checked before anything touches the
/// network.
pub async fn run_sync<R, S, C>(
    registry: &R,
    store: &S,
    connector: &C,
    caller_user_id: &str,
    request: &SyncRequest,
) -> Result<SyncReport, SyncError>
where
    R: SeedRegistry,
    S: MessageStore,
    C: MailboxConnector,
{
    let seed = registry
        .seed(&request.seed_id)
        .await
        .map_err(|e| SyncError::Configuration(e.to_string()))?
        .ok_or_else(|| SyncError::SeedNotFound(request.seed_id.clone()))?;

    if seed.user_id != caller_user_id {
        return Err(SyncError::Forbidden);
    }
    if !seed.is_active {
        return Err(SyncError::Configuration("seed is not active".to_string()));
    }

    let password = request
        .password
        .clone()
        .or_else(|| seed.encrypted_password.clone())
        .ok_or_else(|| SyncError::Configuration("password not configured".to_string()))?;
    if let Some(supplied) = &request.password {
        if seed.encrypted_password.as_deref() != Some(supplied) {
            if let Err(e) = registry.update_password(&seed.id, supplied).await {
                log::warn!("{}: storing updated password failed: {}", seed.id, e);
            }
        }
    }

    let endpoint = resolve_endpoint(&seed)?;
    log::debug!(
        "{}: syncing via {}:{} (tls={})",
        seed.email,
        endpoint.host,
        endpoint.port,
        endpoint.use_tls
    );

    let mut session = connector
        .connect(&endpoint.host, endpoint.port, endpoint.use_tls)
        .await
        .map_err(|e| SyncError::Connectivity(e.to_string()))?;

    let outcome = pull_unseen(&mut session, &seed, &password, store).await;
    // Socket release runs on every path, including a failed login or a
    // mid-loop error; logout and close both swallow their own failures.
    session.logout().await;
    session.close().await;
    let (synced_count, total_unseen) = outcome?;

    let now = Utc::now();
    if let Err(e) = registry.touch_last_sync(&seed.id, now).await {
        log::warn!("{}: recording last sync failed: {}", seed.id, e);
    }

    log::debug!(
        "{}: synced {} of {} unseen",
        seed.email,
        synced_count,
        total_unseen
    );
    Ok(SyncReport {
        success: true,
        synced_count,
        total_unseen,
        details: SyncDetails {
            host: endpoint.host,
            port: endpoint.port,
            email: seed.email,
            last_sync: now.to_rfc3339(),
        },
    })
}

/// The authenticated part of the sync: login, select INBOX, search
/// unseen, fetch up to the ceiling. Per-message fetch, parse, and insert
/// failures are absorbed here; everything else aborts.
async fn pull_unseen<M, S>(
    session: &mut M,
    seed: &Seed,
    password: &str,
    store: &S,
) -> Result<(u32, u32), SyncError>
where
    M: Mailbox,
    S: MessageStore,
{
    let accepted = session
        .login(&seed.email, password)
        .await
        .map_err(|e| SyncError::Connectivity(e.to_string()))?;
    if !accepted {
        return Err(SyncError::Authentication);
    }

    let exists = session
        .select_mailbox("INBOX")
        .await
        .map_err(|e| SyncError::Connectivity(e.to_string()))?;
    let unseen = session
        .search_unseen()
        .await
        .map_err(|e| SyncError::Connectivity(e.to_string()))?;
    log::debug!(
        "{}: INBOX has {} messages, {} unseen",
        seed.email,
        exists,
        unseen.len()
    );

    let total_unseen = unseen.len() as u32;
    let mut synced_count = 0u32;
    for uid in unseen.iter().take(MAX_MESSAGES_PER_SYNC) {
        match session.fetch_message(uid).await {
            Ok(Some(message)) => {
                let insert = NewsletterInsert::from_message(&seed.id, &message);
                match store.insert_newsletter(&insert).await {
                    Ok(()) => synced_count += 1,
                    Err(e) => log::warn!("{}: insert failed for {}: {}", seed.email, uid, e),
                }
            }
            // Unparsable message: already logged by the client; skip it.
            Ok(None) => {}
            Err(e) => log::warn!("{}: fetch failed for {}: {}", seed.email, uid, e),
        }
    }
    Ok((synced_count, total_unseen))
}
