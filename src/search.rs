//! Natural-language email search.
//!
//! Free text goes in ("emails from Sam last week about budget"), a
//! structured [`SearchQuery`] comes out, and a candidate message set is
//! ranked against it: +2.0 per keyword found in the subject, +1.0 per
//! keyword found in the body, additive. Zero-keyword queries act as a pure
//! sender/date filter with every candidate scored 1.0.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mailbox::Message;

/// Default result limit, caller-overridable.
pub const DEFAULT_LIMIT: usize = 20;

/// Subject-match weight per keyword.
const SUBJECT_WEIGHT: f64 = 2.0;
/// Body-match weight per keyword.
const BODY_WEIGHT: f64 = 1.0;
/// Characters of context either side of a body match.
const CONTEXT_WINDOW: usize = 40;
/// Body preview length in characters.
const PREVIEW_CHARS: usize = 500;
/// Match contexts joined into one string per hit.
const MAX_CONTEXTS: usize = 3;

static FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfrom\s+(\w+(?:\s+\w+)?)").unwrap());
static WEEK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(last|this|past)\s+week").unwrap());
static MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(last|this|past)\s+month").unwrap());
static DAYS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"last\s+(\d+)\s+days?").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Common query/email/time vocabulary dropped from keywords.
const STOPWORDS: &[&str] = &[
    "find", "search", "show", "get", "any", "all", "me", "my",
    "emails", "email", "messages", "message", "mail",
    "about", "regarding", "concerning", "mentioning", "containing",
    "with", "the", "a", "an", "and", "or", "for", "in", "on",
    "from", "to", "last", "this", "past", "week", "month", "day", "days",
    "yesterday", "today", "what", "did", "say", "said", "says",
    "anything", "something", "everything", "recent", "new", "old",
];

// ── Query ───────────────────────────────────────────────────────────

/// Parsed search query components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: Vec<String>,
    /// Case-insensitive substring required in the sender header.
    pub sender: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: usize,
}

/// Parse free text into a structured query, relative to the current time.
pub fn parse_query(text: &str) -> SearchQuery {
    parse_query_at(text, Utc::now())
}

fn parse_query_at(text: &str, now: DateTime<Utc>) -> SearchQuery {
    let lower = text.to_lowercase();

    // Sender: first "from <one-or-two words>". Date phrases often follow
    // the name ("from sam last week"), so a trailing stopword is not part
    // of the name.
    let sender = FROM_RE.captures(&lower).map(|caps| {
        let raw = caps.get(1).map_or("", |m| m.as_str());
        match raw.split_once(char::is_whitespace) {
            Some((first, second)) if STOPWORDS.contains(&second.trim()) => first.to_string(),
            _ => raw.to_string(),
        }
    });

    let start_of_day = |d: DateTime<Utc>| d.date_naive().and_time(NaiveTime::MIN).and_utc();

    let mut date_from = None;
    let mut date_to = None;
    if WEEK_RE.is_match(&lower) {
        date_from = Some(now - Duration::days(7));
    } else if MONTH_RE.is_match(&lower) {
        date_from = Some(now - Duration::days(30));
    } else if lower.contains("yesterday") {
        date_from = Some(start_of_day(now) - Duration::days(1));
        date_to = Some(start_of_day(now));
    } else if lower.contains("today") {
        date_from = Some(start_of_day(now));
    }

    // An explicit day count always wins over the phrase heuristics.
    if let Some(caps) = DAYS_RE.captures(&lower)
        && let Ok(days) = caps[1].parse::<i64>()
    {
        date_from = Some(now - Duration::days(days));
    }

    let sender_parts: Vec<&str> = sender
        .as_deref()
        .map(|s| s.split_whitespace().collect())
        .unwrap_or_default();

    let keywords: Vec<String> = WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !STOPWORDS.contains(w))
        .filter(|w| !sender_parts.contains(w))
        .map(String::from)
        .collect();

    SearchQuery {
        keywords,
        sender,
        date_from,
        date_to,
        limit: DEFAULT_LIMIT,
    }
}

// ── Results ─────────────────────────────────────────────────────────

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub subject: String,
    pub from_addr: String,
    pub to_addr: String,
    /// RFC3339 date string; also the tie-break sort key.
    pub date: String,
    pub body_preview: String,
    /// Up to three match contexts joined with " | ".
    pub match_context: String,
    pub relevance_score: f64,
}

/// The query surface payload: resolved query, count, ranked entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: SearchQuery,
    pub result_count: usize,
    pub results: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Rank a candidate set against a query.
pub fn search(messages: &[Message], query: &SearchQuery) -> SearchResponse {
    let sender_filter = query.sender.as_deref().map(str::to_lowercase);
    let mut results = Vec::new();

    for message in messages {
        if let Some(sender) = &sender_filter
            && !message.from_addr.to_lowercase().contains(sender.as_str())
        {
            continue;
        }
        if let Some(from) = query.date_from
            && message.date < from
        {
            continue;
        }
        if let Some(to) = query.date_to
            && message.date > to
        {
            continue;
        }

        let subject_lower = message.subject.to_lowercase();
        let body_lower = message.body.to_lowercase();

        let mut score = 0.0;
        let mut contexts = Vec::new();

        for keyword in &query.keywords {
            if subject_lower.contains(keyword.as_str()) {
                score += SUBJECT_WEIGHT;
                contexts.push(format!("Subject: '{keyword}'"));
            }
            if let Some(idx) = body_lower.find(keyword.as_str()) {
                score += BODY_WEIGHT;
                contexts.push(context_snippet(&message.body, idx, keyword.len()));
            }
        }

        // A keyword-free query is a pure sender/date filter.
        if query.keywords.is_empty() {
            score = 1.0;
        }

        if score > 0.0 {
            contexts.truncate(MAX_CONTEXTS);
            results.push(SearchHit {
                subject: message.subject.clone(),
                from_addr: message.from_addr.clone(),
                to_addr: message.to_addr.clone(),
                date: message.date.to_rfc3339(),
                body_preview: body_preview(&message.body),
                match_context: contexts.join(" | "),
                relevance_score: score,
            });
        }
    }

    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.date.cmp(&b.date))
    });
    results.truncate(query.limit);

    SearchResponse {
        query: query.clone(),
        result_count: results.len(),
        results,
    }
}

/// One-call query surface: free text in, structured payload out.
pub fn run_query(messages: &[Message], text: &str, limit: Option<usize>) -> SearchResponse {
    let mut query = parse_query(text);
    if let Some(limit) = limit {
        query.limit = limit;
    }
    search(messages, &query)
}

/// Extract a ±40-character window around a body match, with normalized
/// whitespace and ellipses marking truncation.
fn context_snippet(body: &str, match_idx: usize, match_len: usize) -> String {
    let mut start = match_idx.saturating_sub(CONTEXT_WINDOW);
    let mut end = (match_idx + match_len + CONTEXT_WINDOW).min(body.len());
    // The match index comes from the lowercased body; clamp to char
    // boundaries of the original in case lowercasing shifted byte offsets.
    while start > 0 && !body.is_char_boundary(start) {
        start -= 1;
    }
    while end < body.len() && !body.is_char_boundary(end) {
        end += 1;
    }

    let mut snippet = normalize_whitespace(body[start..end].trim());
    if start > 0 {
        snippet = format!("...{snippet}");
    }
    if end < body.len() {
        snippet.push_str("...");
    }
    snippet
}

fn body_preview(body: &str) -> String {
    let total = body.chars().count();
    let mut preview: String = body.chars().take(PREVIEW_CHARS).collect();
    if total > PREVIEW_CHARS {
        preview.push_str("...");
    }
    normalize_whitespace(preview.trim())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
