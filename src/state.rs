//! Sync state — the dedup store.
//!
//! Two independently re-derivable JSON records under the state directory:
//! a fingerprint membership set (`seen.json`, with an updated-at stamp) and
//! a single last-sync timestamp (`last_sync.json`). Either record resets
//! safely to empty/absent; the only cost is reprocessing.
//!
//! `mark_seen` is durable before it returns. The orchestrator performs the
//! routing write first and marks seen after, so a crash mid-batch leaves
//! state consistent with exactly the messages whose mutation completed.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::StateError;

const SEEN_FILE: &str = "seen.json";
const LAST_SYNC_FILE: &str = "last_sync.json";

#[derive(Serialize, Deserialize)]
struct SeenRecord {
    fingerprints: Vec<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct LastSyncRecord {
    last_sync: DateTime<Utc>,
}

/// Dedup-store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStats {
    pub processed: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Persisted set of processed-message fingerprints plus a last-sync
/// timestamp. Append-only membership; loaded at startup; flushed
/// synchronously on every mutation.
pub struct SyncState {
    seen_file: PathBuf,
    last_sync_file: PathBuf,
    seen: HashSet<String>,
}

impl SyncState {
    /// Load state from `dir`, creating the directory when missing.
    ///
    /// A corrupt persisted record is treated as empty, never fatal —
    /// correctness is traded for availability (possible reprocessing).
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let seen_file = dir.join(SEEN_FILE);
        let last_sync_file = dir.join(LAST_SYNC_FILE);

        let seen = match fs::read_to_string(&seen_file).await {
            Ok(text) => match serde_json::from_str::<SeenRecord>(&text) {
                Ok(record) => record.fingerprints.into_iter().collect(),
                Err(e) => {
                    warn!(error = %e, "Corrupt seen record, starting empty");
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };

        Ok(Self {
            seen_file,
            last_sync_file,
            seen,
        })
    }

    /// Whether this fingerprint was already processed.
    pub fn is_seen(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a fingerprint as processed. Durable before returning.
    pub async fn mark_seen(&mut self, fingerprint: String) -> Result<(), StateError> {
        self.seen.insert(fingerprint);
        self.save_seen().await
    }

    /// Timestamp of the last completed sync, absent when never synced or
    /// when the record is unreadable.
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        let text = fs::read_to_string(&self.last_sync_file).await.ok()?;
        match serde_json::from_str::<LastSyncRecord>(&text) {
            Ok(record) => Some(record.last_sync),
            Err(e) => {
                warn!(error = %e, "Corrupt last-sync record, treating as absent");
                None
            }
        }
    }

    /// Advance last-sync to now. Written immediately.
    pub async fn update_last_sync(&mut self) -> Result<(), StateError> {
        let record = LastSyncRecord {
            last_sync: Utc::now(),
        };
        let text = serde_json::to_string_pretty(&record)?;
        fs::write(&self.last_sync_file, text).await?;
        Ok(())
    }

    /// Reset all state: empty fingerprint set, absent last-sync. The sole
    /// operation permitted to delete a persisted record.
    pub async fn clear(&mut self) -> Result<(), StateError> {
        self.seen.clear();
        self.save_seen().await?;
        if self.last_sync_file.exists() {
            fs::remove_file(&self.last_sync_file).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> StateStats {
        StateStats {
            processed: self.seen.len(),
            last_sync: self.last_sync().await,
        }
    }

    async fn save_seen(&self) -> Result<(), StateError> {
        let record = SeenRecord {
            fingerprints: self.seen.iter().cloned().collect(),
            updated_at: Utc::now(),
        };
        let text = serde_json::to_string_pretty(&record)?;
        fs::write(&self.seen_file, text).await?;
        Ok(())
    }
}
