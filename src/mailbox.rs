//! Inbound message type, fingerprint derivation, and the mailbox trait.
//!
//! Transport plumbing (IMAP sessions, auth, MIME decoding) lives behind the
//! [`Mailbox`] trait — the sync core only sees already-decoded messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MailboxError;

// ── Message ─────────────────────────────────────────────────────────

/// A fetched email. Immutable once fetched; owned by the orchestrator for
/// one batch; never itself persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Transport Message-ID, when the server provided one.
    pub id: Option<String>,
    /// Raw From header ("Jane Doe <jane@example.com>" or bare address).
    pub from_addr: String,
    /// Recipient address.
    pub to_addr: String,
    pub subject: String,
    /// Decoded plain-text body.
    pub body: String,
    /// Receipt timestamp, normalized to UTC at ingestion. Naive transport
    /// timestamps are assumed to already be UTC.
    pub date: DateTime<Utc>,
}

impl Message {
    /// Stable derived identity for duplicate detection.
    ///
    /// Prefers the transport id; falls back to a content hash of
    /// (sender, subject, timestamp) when the server gave none. Two messages
    /// differing only in timestamp get different fallback fingerprints.
    pub fn fingerprint(&self) -> String {
        if let Some(id) = &self.id
            && !id.is_empty()
        {
            return id.clone();
        }
        let content = format!(
            "{}|{}|{}",
            self.from_addr,
            self.subject,
            self.date.to_rfc3339()
        );
        let digest = Sha256::digest(content.as_bytes());
        hex_encode(&digest)
    }

    /// Display name portion of the From header, falling back to the raw
    /// header when there is no `Name <addr>` form.
    pub fn from_name(&self) -> &str {
        match self.from_addr.split_once('<') {
            Some((name, _)) if !name.trim().is_empty() => name.trim(),
            _ => self.from_addr.as_str(),
        }
    }
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Mailbox trait ───────────────────────────────────────────────────

/// Trait for the mailbox transport — pure I/O, no business logic.
///
/// A connectivity failure aborts the whole batch before any message is
/// processed; per-message recovery is the orchestrator's job, not the
/// transport's.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch up to `max_count` messages received since `since`, in
    /// mailbox order.
    async fn fetch(
        &self,
        since: DateTime<Utc>,
        max_count: usize,
    ) -> Result<Vec<Message>, MailboxError>;
}
