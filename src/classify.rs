//! Classification types and the classifier collaborator.
//!
//! The classifier is a remote model call: one [`Message`] in, one
//! [`Classification`] out. Malformed model output degrades to a benign
//! log-entry result instead of failing the message; transport failures
//! surface as [`ClassifyError`] and are counted by the orchestrator.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::mailbox::Message;

// ── Category ────────────────────────────────────────────────────────

/// Classification label controlling routing destination.
///
/// Closed set with exhaustive dispatch in the router — adding a category is
/// a checked, localized change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Work-related action items, project tasks, deadlines.
    WorkTask,
    /// Personal goals, fitness, self-improvement tasks.
    PersonalTask,
    /// Household, family, errands.
    HomeTask,
    /// Contact details, relationship context, meeting someone new.
    PersonInfo,
    /// Tools, concepts, learning materials worth saving.
    Knowledge,
    /// FYI, general context, updates — no action needed.
    LogEntry,
    /// Spam, newsletters, automated notifications, marketing.
    Ignore,
}

impl Category {
    /// Parse a wire-format label. Unknown labels degrade to `LogEntry` so
    /// the set stays closed.
    pub fn parse(label: &str) -> Self {
        match label {
            "work_task" => Self::WorkTask,
            "personal_task" => Self::PersonalTask,
            "home_task" => Self::HomeTask,
            "person_info" => Self::PersonInfo,
            "knowledge" => Self::Knowledge,
            "log_entry" => Self::LogEntry,
            "ignore" => Self::Ignore,
            other => {
                warn!(label = %other, "Unknown category label, treating as log_entry");
                Self::LogEntry
            }
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::WorkTask => "work_task",
            Self::PersonalTask => "personal_task",
            Self::HomeTask => "home_task",
            Self::PersonInfo => "person_info",
            Self::Knowledge => "knowledge",
            Self::LogEntry => "log_entry",
            Self::Ignore => "ignore",
        }
    }
}

// ── Priority ────────────────────────────────────────────────────────

/// Task priority: P1 (urgent/today), P2 (important/this week), P3 (normal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    #[default]
    P3,
}

impl Priority {
    pub fn parse(label: &str) -> Self {
        match label {
            "P1" => Self::P1,
            "P2" => Self::P2,
            _ => Self::P3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Structured labels for one message. Produced once by the classifier,
/// consumed once by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub priority: Priority,
    /// Names of people mentioned.
    pub people: Vec<String>,
    /// ISO date string when a deadline was found.
    pub deadline: Option<String>,
    /// One-line summary.
    pub summary: String,
    /// Specific actions needed.
    pub action_items: Vec<String>,
    /// Additional tags like "meeting", "followup", "waiting".
    pub tags: Vec<String>,
}

impl Classification {
    /// Benign fallback used when the model's output cannot be parsed.
    pub fn fallback(message: &Message) -> Self {
        Self {
            category: Category::LogEntry,
            priority: Priority::P3,
            people: Vec::new(),
            deadline: None,
            summary: truncate(&message.subject, 100),
            action_items: Vec::new(),
            tags: Vec::new(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// ── Classifier trait ────────────────────────────────────────────────

/// Trait for the classification collaborator.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &Message) -> Result<Classification, ClassifyError>;
}

// ── Anthropic-backed implementation ─────────────────────────────────

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Body characters sent to the model per message.
const BODY_LIMIT: usize = 4000;

const CLASSIFICATION_PROMPT: &str = r#"Analyze this email and extract structured information.

Email:
From: {from_addr}
To: {to_addr}
Subject: {subject}
Date: {date}

Body:
{body}

---

Classify and extract information as JSON with these fields:

- category: One of:
  - "work_task" - Work-related action items, project tasks, deadlines
  - "personal_task" - Personal goals, fitness, self-improvement tasks
  - "home_task" - Household, family, errands
  - "person_info" - Contact details, relationship context, meeting someone new
  - "knowledge" - Tools, concepts, learning materials worth saving
  - "log_entry" - FYI, general context, updates (no action needed)
  - "ignore" - Spam, newsletters, automated notifications, marketing

- priority: "P1" (urgent/today), "P2" (important/this week), "P3" (normal)

- people: Array of names mentioned (extract first name + last name if available)

- deadline: ISO date string if deadline mentioned, null otherwise

- summary: One concise sentence summarizing the email (under 100 chars)

- action_items: Array of specific actions needed (empty if none)

- tags: Array of relevant tags like "meeting", "followup", "waiting", "review"

Respond with ONLY valid JSON, no other text."#;

/// Classifier backed by the Anthropic Messages API.
pub struct AnthropicClassifier {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(default)]
    text: String,
}

/// Wire shape of the model's JSON answer. Every field is defaulted so a
/// partially-formed answer still classifies.
#[derive(Deserialize)]
struct RawClassification {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    people: Vec<String>,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    action_items: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl AnthropicClassifier {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: model.into(),
        }
    }

    fn build_prompt(message: &Message) -> String {
        CLASSIFICATION_PROMPT
            .replace("{from_addr}", &message.from_addr)
            .replace("{to_addr}", &message.to_addr)
            .replace("{subject}", &message.subject)
            .replace("{date}", &message.date.to_rfc3339())
            .replace("{body}", &truncate(&message.body, BODY_LIMIT))
    }

    /// Parse the model's text answer into a [`Classification`], degrading
    /// to the benign fallback on malformed JSON.
    fn parse_answer(text: &str, message: &Message) -> Classification {
        let cleaned = strip_code_fences(text.trim());

        let raw: RawClassification = match serde_json::from_str(cleaned) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    subject = %truncate(&message.subject, 50),
                    error = %e,
                    "Classifier returned malformed JSON, using fallback"
                );
                return Classification::fallback(message);
            }
        };

        Classification {
            category: raw
                .category
                .as_deref()
                .map(Category::parse)
                .unwrap_or(Category::LogEntry),
            priority: raw
                .priority
                .as_deref()
                .map(Priority::parse)
                .unwrap_or_default(),
            people: raw.people,
            deadline: raw.deadline,
            summary: raw
                .summary
                .unwrap_or_else(|| truncate(&message.subject, 100)),
            action_items: raw.action_items,
            tags: raw.tags,
        }
    }
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fences(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let inner = match text.split_once('\n') {
        Some((_, rest)) => rest,
        None => return text,
    };
    inner.rsplit_once("```").map(|(body, _)| body).unwrap_or(inner).trim()
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, message: &Message) -> Result<Classification, ClassifyError> {
        let request = ApiRequest {
            model: &self.model,
            max_tokens: 1024,
            messages: vec![ApiMessage {
                role: "user",
                content: Self::build_prompt(message),
            }],
        };

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let api: ApiResponse = response.json().await?;
        let text = api
            .content
            .first()
            .map(|c| c.text.as_str())
            .ok_or_else(|| ClassifyError::InvalidResponse("empty content block".into()))?;

        let classification = Self::parse_answer(text, message);
        debug!(
            category = classification.category.label(),
            priority = classification.priority.label(),
            "Message classified"
        );
        Ok(classification)
    }
}
