//! Content router — maps one (message, classification) pair onto
//! append-only mutations of the knowledge-base tree.
//!
//! Tree layout under the root:
//! - `work.md`, `personal.md`, `home.md` — per-category task files
//! - `people/<slug>.md` — one file per person
//! - `knowledge/references/<topic>.md` — per-topic reference notes
//! - `logs/YYYY-MM-DD.md` — daily activity logs
//!
//! Every write goes through the shared section editor; nothing is ever
//! deleted or rewritten in place.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::classify::{Category, Classification};
use crate::error::RouteError;
use crate::mailbox::Message;
use crate::section::{insert_into_section, slugify};

const TODO_HEADER: &str = "## TODO";
const INTERACTIONS_HEADER: &str = "## Interactions";
const ACTIVITY_HEADER: &str = "## Email Activity";

/// Characters of the summary used to derive a knowledge topic slug.
const TOPIC_CHARS: usize = 50;
/// Body characters kept in a knowledge entry.
const KNOWLEDGE_BODY_CHARS: usize = 1000;
/// At most this many `@person:` tags on a task line.
const TASK_PERSON_TAGS: usize = 2;

/// Routes classified messages to markdown files under a knowledge tree.
pub struct ContentRouter {
    work_file: PathBuf,
    personal_file: PathBuf,
    home_file: PathBuf,
    people_dir: PathBuf,
    logs_dir: PathBuf,
    knowledge_dir: PathBuf,
}

impl ContentRouter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            work_file: root.join("work.md"),
            personal_file: root.join("personal.md"),
            home_file: root.join("home.md"),
            people_dir: root.join("people"),
            logs_dir: root.join("logs"),
            knowledge_dir: root.join("knowledge").join("references"),
        }
    }

    /// Create the tree's directories. Files are created on first write.
    pub async fn ensure_dirs(&self) -> Result<(), RouteError> {
        fs::create_dir_all(&self.people_dir).await?;
        fs::create_dir_all(&self.logs_dir).await?;
        fs::create_dir_all(&self.knowledge_dir).await?;
        Ok(())
    }

    /// Apply category-specific mutations and return every file path touched.
    ///
    /// `Ignore` touches nothing; every other category touches at least one
    /// file. When people are named and the category is not `PersonInfo`,
    /// each named person's file also receives a secondary interaction line,
    /// and those paths are included in the result.
    pub async fn route(
        &self,
        message: &Message,
        classification: &Classification,
    ) -> Result<Vec<PathBuf>, RouteError> {
        let mut touched = Vec::new();

        match classification.category {
            Category::Ignore => return Ok(touched),
            Category::WorkTask => {
                self.add_task(&self.work_file, classification).await?;
                touched.push(self.work_file.clone());
            }
            Category::PersonalTask => {
                self.add_task(&self.personal_file, classification).await?;
                touched.push(self.personal_file.clone());
            }
            Category::HomeTask => {
                self.add_task(&self.home_file, classification).await?;
                touched.push(self.home_file.clone());
            }
            Category::PersonInfo => {
                for person in &classification.people {
                    let path = self.person_file(person);
                    let line = format!(
                        "- {}: {} (via email)",
                        message.date.format("%Y-%m-%d"),
                        classification.summary
                    );
                    insert_into_section(&path, INTERACTIONS_HEADER, &line).await?;
                    touched.push(path);
                }
            }
            Category::Knowledge => {
                touched.push(self.add_knowledge(message, classification).await?);
            }
            Category::LogEntry => {
                touched.push(self.add_daily_log(message, classification).await?);
            }
        }

        // A task or note mentioning someone also leaves a trace on their file.
        if classification.category != Category::PersonInfo {
            for person in &classification.people {
                let path = self.person_file(person);
                let line = format!(
                    "- {}: Email regarding: {}",
                    message.date.format("%Y-%m-%d"),
                    classification.summary
                );
                insert_into_section(&path, INTERACTIONS_HEADER, &line).await?;
                touched.push(path);
            }
        }

        debug!(
            category = classification.category.label(),
            files = touched.len(),
            "Message routed"
        );
        Ok(touched)
    }

    async fn add_task(
        &self,
        file: &Path,
        classification: &Classification,
    ) -> Result<(), RouteError> {
        let line = format_task_line(classification);
        insert_into_section(file, TODO_HEADER, &line).await?;
        Ok(())
    }

    /// Append a dated block to a per-topic reference file. Created with a
    /// title header when absent, else appended after existing content.
    async fn add_knowledge(
        &self,
        message: &Message,
        classification: &Classification,
    ) -> Result<PathBuf, RouteError> {
        let summary = &classification.summary;
        let topic: String = summary.chars().take(TOPIC_CHARS).collect();
        let mut slug = slugify(&topic);
        if slug.is_empty() {
            slug = "misc".to_string();
        }
        let path = self.knowledge_dir.join(format!("{slug}.md"));

        let body: String = message.body.chars().take(KNOWLEDGE_BODY_CHARS).collect();
        let block = format!(
            "\n## {summary}\n\n*Source: Email from {} on {}*\n\n{body}\n\n---\n",
            message.from_addr,
            message.date.format("%Y-%m-%d"),
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if path.exists() {
            let existing = fs::read_to_string(&path).await?;
            fs::write(&path, format!("{existing}{block}")).await?;
        } else {
            fs::write(&path, format!("# {summary}\n{block}")).await?;
        }
        Ok(path)
    }

    /// Append an entry (with checklist-formatted action items) to the log
    /// file named by the message's calendar date.
    async fn add_daily_log(
        &self,
        message: &Message,
        classification: &Classification,
    ) -> Result<PathBuf, RouteError> {
        let path = self
            .logs_dir
            .join(format!("{}.md", message.date.format("%Y-%m-%d")));

        let mut entry = format!(
            "- **Email from {}**: {}",
            message.from_name(),
            classification.summary
        );
        for item in &classification.action_items {
            entry.push_str(&format!("\n  - [ ] {item}"));
        }

        insert_into_section(&path, ACTIVITY_HEADER, &entry).await?;
        Ok(path)
    }

    fn person_file(&self, person: &str) -> PathBuf {
        self.people_dir.join(format!("{}.md", slugify(person)))
    }
}

/// Task line, fixed field order:
/// `- [<priority>] <summary>` then optional `@deadline:<date>`, up to two
/// `@person:` tags, then `@waiting` / `@followup` when present among tags.
fn format_task_line(classification: &Classification) -> String {
    let mut parts = vec![
        format!("- [{}]", classification.priority.label()),
        classification.summary.clone(),
    ];

    if let Some(deadline) = &classification.deadline {
        parts.push(format!("@deadline:{deadline}"));
    }
    for person in classification.people.iter().take(TASK_PERSON_TAGS) {
        parts.push(format!("@person:{person}"));
    }
    if classification.tags.iter().any(|t| t == "waiting") {
        parts.push("@waiting".to_string());
    }
    if classification.tags.iter().any(|t| t == "followup") {
        parts.push("@followup".to_string());
    }

    parts.join(" ")
}
