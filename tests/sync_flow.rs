//! End-to-end orchestration tests with fake mailbox and classifier
//! collaborators over a real temp-dir knowledge tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use mailgraph::classify::{Category, Classification, Classifier, Priority};
use mailgraph::config::{FilterConfig, FilterMode};
use mailgraph::error::{ClassifyError, MailboxError};
use mailgraph::filter::MailFilter;
use mailgraph::mailbox::{Mailbox, Message};
use mailgraph::router::ContentRouter;
use mailgraph::state::SyncState;
use mailgraph::sync::{SyncEngine, SyncReport};

// ── Fakes ───────────────────────────────────────────────────────────

struct FakeMailbox {
    messages: Vec<Message>,
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn fetch(
        &self,
        _since: DateTime<Utc>,
        max_count: usize,
    ) -> Result<Vec<Message>, MailboxError> {
        Ok(self.messages.iter().take(max_count).cloned().collect())
    }
}

struct DownMailbox;

#[async_trait]
impl Mailbox for DownMailbox {
    async fn fetch(
        &self,
        _since: DateTime<Utc>,
        _max_count: usize,
    ) -> Result<Vec<Message>, MailboxError> {
        Err(MailboxError::Connection {
            host: "imap.example.com".into(),
            reason: "connection refused".into(),
        })
    }
}

/// Classifier scripted by subject; unknown subjects are an error.
struct ScriptedClassifier {
    by_subject: HashMap<String, Classification>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(entries: Vec<(&str, Classification)>) -> Self {
        Self {
            by_subject: entries
                .into_iter()
                .map(|(s, c)| (s.to_string(), c))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, message: &Message) -> Result<Classification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_subject
            .get(&message.subject)
            .cloned()
            .ok_or_else(|| ClassifyError::InvalidResponse("unscripted subject".into()))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn message(id: &str, from: &str, subject: &str) -> Message {
    Message {
        id: Some(id.to_string()),
        from_addr: from.into(),
        to_addr: "me@example.com".into(),
        subject: subject.into(),
        body: format!("Body of {subject}."),
        date: Utc::now() - Duration::hours(3),
    }
}

fn classification(category: Category) -> Classification {
    Classification {
        category,
        priority: Priority::P2,
        people: Vec::new(),
        deadline: None,
        summary: "Scripted summary".into(),
        action_items: Vec::new(),
        tags: Vec::new(),
    }
}

fn blocklist(domains: &[&str]) -> MailFilter {
    MailFilter::from_config(&FilterConfig {
        mode: FilterMode::Blocklist,
        domains: domains.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    })
    .unwrap()
}

async fn build_engine(
    dir: &TempDir,
    mailbox: Arc<dyn Mailbox>,
    classifier: Arc<dyn Classifier>,
    filter: MailFilter,
) -> SyncEngine {
    let router = ContentRouter::new(dir.path().join("kb"));
    router.ensure_dirs().await.unwrap();
    let state = SyncState::load(dir.path().join("state")).await.unwrap();
    SyncEngine::new(mailbox, classifier, filter, router, state)
}

fn since() -> DateTime<Utc> {
    Utc::now() - Duration::days(7)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_accumulates_all_outcome_kinds() {
    let dir = TempDir::new().unwrap();

    let mut task = classification(Category::WorkTask);
    task.people = vec!["Alice Smith".into()];

    let classifier = Arc::new(ScriptedClassifier::new(vec![
        ("Project plan", task),
        ("Weekly digest", classification(Category::Ignore)),
        // "Mystery" is unscripted → classification error.
    ]));

    let mailbox = Arc::new(FakeMailbox {
        messages: vec![
            message("<m1>", "Sam Lee <sam@work.com>", "Project plan"),
            message("<m2>", "news@spam.com", "Sale!"),
            message("<m3>", "bot@updates.com", "Weekly digest"),
            message("<m4>", "eve@work.com", "Mystery"),
        ],
    });

    let mut engine = build_engine(
        &dir,
        mailbox,
        classifier.clone(),
        blocklist(&["spam.com"]),
    )
    .await;

    let report = engine.run(since(), 100).await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            new: 1,
            filtered: 1,
            ignored: 1,
            errors: 1,
        }
    );

    // Routed mutation landed, including the cross-cutting person note.
    let work = tokio::fs::read_to_string(dir.path().join("kb/work.md"))
        .await
        .unwrap();
    assert!(work.contains("- [P2] Scripted summary @person:Alice Smith"));
    let alice = tokio::fs::read_to_string(dir.path().join("kb/people/alice-smith.md"))
        .await
        .unwrap();
    assert!(alice.contains("Email regarding: Scripted summary"));

    // Filtered and ignored messages were marked seen; the errored one was
    // not, so it stays eligible for a retry.
    let state = engine.state();
    assert!(state.is_seen("<m1>"));
    assert!(state.is_seen("<m2>"));
    assert!(state.is_seen("<m3>"));
    assert!(!state.is_seen("<m4>"));

    // The filtered message never reached the classifier.
    assert_eq!(classifier.call_count(), 3);
    assert!(state.last_sync().await.is_some());
}

#[tokio::test]
async fn second_run_skips_seen_messages() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(ScriptedClassifier::new(vec![(
        "Project plan",
        classification(Category::WorkTask),
    )]));
    let mailbox = Arc::new(FakeMailbox {
        messages: vec![message("<m1>", "sam@work.com", "Project plan")],
    });

    let mut engine = build_engine(&dir, mailbox, classifier.clone(), blocklist(&[])).await;

    let first = engine.run(since(), 100).await.unwrap();
    assert_eq!(first.new, 1);
    let second = engine.run(since(), 100).await.unwrap();
    assert_eq!(second, SyncReport::default());

    // One classification total; the work file got exactly one task line.
    assert_eq!(classifier.call_count(), 1);
    let work = tokio::fs::read_to_string(dir.path().join("kb/work.md"))
        .await
        .unwrap();
    assert_eq!(work.matches("- [P2] Scripted summary").count(), 1);
}

#[tokio::test]
async fn dedup_state_survives_engine_restart() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(ScriptedClassifier::new(vec![(
        "Project plan",
        classification(Category::WorkTask),
    )]));
    let mailbox = Arc::new(FakeMailbox {
        messages: vec![message("<m1>", "sam@work.com", "Project plan")],
    });

    let mut engine = build_engine(
        &dir,
        mailbox.clone(),
        classifier.clone(),
        blocklist(&[]),
    )
    .await;
    engine.run(since(), 100).await.unwrap();
    drop(engine);

    // Fresh engine over the same state directory.
    let mut engine = build_engine(&dir, mailbox, classifier.clone(), blocklist(&[])).await;
    let report = engine.run(since(), 100).await.unwrap();
    assert_eq!(report, SyncReport::default());
    assert_eq!(classifier.call_count(), 1);
}

#[tokio::test]
async fn routing_failure_leaves_message_retryable() {
    let dir = TempDir::new().unwrap();
    // A directory where the work file should be makes the write fail.
    tokio::fs::create_dir_all(dir.path().join("kb/work.md"))
        .await
        .unwrap();

    let classifier = Arc::new(ScriptedClassifier::new(vec![(
        "Project plan",
        classification(Category::WorkTask),
    )]));
    let mailbox = Arc::new(FakeMailbox {
        messages: vec![message("<m1>", "sam@work.com", "Project plan")],
    });

    let mut engine = build_engine(
        &dir,
        mailbox.clone(),
        classifier.clone(),
        blocklist(&[]),
    )
    .await;
    let report = engine.run(since(), 100).await.unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(report.new, 0);
    assert!(!engine.state().is_seen("<m1>"));
    // Last-sync still advanced — partial progress is acceptable.
    assert!(engine.state().last_sync().await.is_some());
    drop(engine);

    // Clear the obstruction; the next run picks the message up again.
    tokio::fs::remove_dir(dir.path().join("kb/work.md"))
        .await
        .unwrap();
    let mut engine = build_engine(&dir, mailbox, classifier, blocklist(&[])).await;
    let report = engine.run(since(), 100).await.unwrap();
    assert_eq!(report.new, 1);
    assert!(engine.state().is_seen("<m1>"));
}

#[tokio::test]
async fn connectivity_failure_aborts_before_processing() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(ScriptedClassifier::new(vec![]));
    let mut engine = build_engine(
        &dir,
        Arc::new(DownMailbox),
        classifier.clone(),
        blocklist(&[]),
    )
    .await;

    let result = engine.run(since(), 100).await;
    assert!(result.is_err());
    assert_eq!(classifier.call_count(), 0);
    // The batch never started; last-sync must not advance.
    assert!(engine.state().last_sync().await.is_none());
}

#[tokio::test]
async fn allowlist_filters_everything_without_classifying() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(ScriptedClassifier::new(vec![]));
    let mailbox = Arc::new(FakeMailbox {
        messages: vec![
            message("<m1>", "a@one.com", "Hello"),
            message("<m2>", "b@two.com", "World"),
        ],
    });
    let allowlist = MailFilter::from_config(&FilterConfig {
        mode: FilterMode::Allowlist,
        domains: vec!["work.com".into()],
        ..Default::default()
    })
    .unwrap();

    let mut engine = build_engine(&dir, mailbox, classifier.clone(), allowlist).await;
    let report = engine.run(since(), 100).await.unwrap();

    assert_eq!(report.filtered, 2);
    assert_eq!(classifier.call_count(), 0);
    assert!(engine.state().is_seen("<m1>"));
    assert!(engine.state().is_seen("<m2>"));
}

#[tokio::test]
async fn fetch_cap_is_respected() {
    let dir = TempDir::new().unwrap();
    let classifier = Arc::new(ScriptedClassifier::new(vec![
        ("One", classification(Category::LogEntry)),
        ("Two", classification(Category::LogEntry)),
        ("Three", classification(Category::LogEntry)),
    ]));
    let mailbox = Arc::new(FakeMailbox {
        messages: vec![
            message("<m1>", "a@work.com", "One"),
            message("<m2>", "a@work.com", "Two"),
            message("<m3>", "a@work.com", "Three"),
        ],
    });

    let mut engine = build_engine(&dir, mailbox, classifier, blocklist(&[])).await;
    let report = engine.run(since(), 2).await.unwrap();
    assert_eq!(report.new, 2);
    assert!(!engine.state().is_seen("<m3>"));
}
