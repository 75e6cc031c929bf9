//! Sync orchestrator — sequences filter → classifier → router → dedup
//! store over one fetched batch.
//!
//! Strictly sequential, one message at a time, in fetch order. Connectivity
//! failures abort the batch; classification and routing failures are
//! contained per message and counted. The routing write always happens
//! before the fingerprint is marked seen, so a crash between the two only
//! ever causes reprocessing, never a silently lost mutation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::classify::{Category, Classifier};
use crate::error::Error;
use crate::filter::MailFilter;
use crate::mailbox::Mailbox;
use crate::router::ContentRouter;
use crate::state::SyncState;

/// Overlap (hours) subtracted from last-sync when resuming incrementally.
/// The dedup store absorbs the duplicates; the overlap covers messages
/// that arrived while the previous run was finishing.
const RESUME_OVERLAP_HOURS: i64 = 1;

/// Aggregate counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Messages classified and routed to at least one file.
    pub new: usize,
    /// Messages rejected by the pre-classification filter.
    pub filtered: usize,
    /// Messages the classifier labelled `ignore`.
    pub ignored: usize,
    /// Messages that failed classification or routing.
    pub errors: usize,
}

/// Sequences one batch of messages through the pipeline.
pub struct SyncEngine {
    mailbox: Arc<dyn Mailbox>,
    classifier: Arc<dyn Classifier>,
    filter: MailFilter,
    router: ContentRouter,
    state: SyncState,
}

impl SyncEngine {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        classifier: Arc<dyn Classifier>,
        filter: MailFilter,
        router: ContentRouter,
        state: SyncState,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            filter,
            router,
            state,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SyncState {
        &mut self.state
    }

    /// Fetch window start: last-sync minus a safety overlap when resuming,
    /// else now minus the configured lookback. `full` forces the lookback.
    pub async fn since_timestamp(&self, lookback_days: i64, full: bool) -> DateTime<Utc> {
        if !full
            && let Some(last) = self.state.last_sync().await
        {
            return last - Duration::hours(RESUME_OVERLAP_HOURS);
        }
        Utc::now() - Duration::days(lookback_days)
    }

    /// Run one batch: fetch, then process each message in fetch order.
    ///
    /// Last-sync advances once after the loop, unconditionally — partial
    /// progress is expected and acceptable.
    pub async fn run(
        &mut self,
        since: DateTime<Utc>,
        max_count: usize,
    ) -> Result<SyncReport, Error> {
        let messages = self.mailbox.fetch(since, max_count).await?;
        info!(count = messages.len(), "Fetched messages");

        let mut report = SyncReport::default();

        for message in &messages {
            let fingerprint = message.fingerprint();
            if self.state.is_seen(&fingerprint) {
                continue;
            }

            if !self.filter.should_process(message) {
                info!(
                    subject = %excerpt(&message.subject),
                    reason = %self.filter.match_reason(message),
                    "Message filtered"
                );
                self.state.mark_seen(fingerprint).await?;
                report.filtered += 1;
                continue;
            }

            let classification = match self.classifier.classify(message).await {
                Ok(c) => c,
                Err(e) => {
                    error!(
                        subject = %excerpt(&message.subject),
                        error = %e,
                        "Classification failed"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            if classification.category == Category::Ignore {
                self.state.mark_seen(fingerprint).await?;
                report.ignored += 1;
                continue;
            }

            match self.router.route(message, &classification).await {
                Ok(touched) => {
                    info!(
                        category = classification.category.label(),
                        files = touched.len(),
                        subject = %excerpt(&message.subject),
                        "Message routed"
                    );
                    // Write-then-mark: the mutation is durable before the
                    // fingerprint is.
                    self.state.mark_seen(fingerprint).await?;
                    report.new += 1;
                }
                Err(e) => {
                    error!(
                        subject = %excerpt(&message.subject),
                        error = %e,
                        "Routing failed, message left unseen"
                    );
                    report.errors += 1;
                }
            }
        }

        self.state.update_last_sync().await?;

        info!(
            new = report.new,
            filtered = report.filtered,
            ignored = report.ignored,
            errors = report.errors,
            "Sync complete"
        );
        Ok(report)
    }
}

fn excerpt(subject: &str) -> String {
    subject.chars().take(50).collect()
}
