//! Pre-classification filter — decides whether a message is worth
//! classifying at all, before any model call is spent on it.
//!
//! Two modes:
//! - blocklist: default allow, a rule match means skip;
//! - allowlist: default deny, a rule match means process.
//!
//! Match precedence, first hit wins: exact domain, exact address, regex
//! pattern against the raw From header. All matching is case-insensitive.

use std::collections::HashSet;

use regex::RegexBuilder;
use tracing::debug;

use crate::config::{FilterConfig, FilterMode};
use crate::error::FilterError;
use crate::mailbox::Message;

/// Which rule matched a sender. Precedence order is the variant order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleMatch {
    Domain(String),
    Address(String),
    Pattern(String),
}

/// Compiled filter ruleset, immutable for a run.
pub struct MailFilter {
    mode: FilterMode,
    domains: HashSet<String>,
    addresses: HashSet<String>,
    patterns: Vec<regex::Regex>,
}

impl MailFilter {
    /// Compile a filter from configuration. A bad regex is a construction
    /// error, never a runtime one.
    pub fn from_config(config: &FilterConfig) -> Result<Self, FilterError> {
        let patterns = config
            .patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mode: config.mode,
            domains: config.domains.iter().map(|d| d.to_lowercase()).collect(),
            addresses: config.addresses.iter().map(|a| a.to_lowercase()).collect(),
            patterns,
        })
    }

    /// Whether this message should be classified and routed.
    pub fn should_process(&self, message: &Message) -> bool {
        let matched = self.find_match(message).is_some();
        match self.mode {
            FilterMode::Blocklist => !matched,
            FilterMode::Allowlist => matched,
        }
    }

    /// Name the rule behind the decision: `domain:<d>`, `address:<a>`,
    /// `pattern:<p>`, or `no match`. Recomputed with the identical
    /// precedence as [`Self::should_process`], so the two always agree.
    pub fn match_reason(&self, message: &Message) -> String {
        match self.find_match(message) {
            Some(RuleMatch::Domain(d)) => format!("domain:{d}"),
            Some(RuleMatch::Address(a)) => format!("address:{a}"),
            Some(RuleMatch::Pattern(p)) => format!("pattern:{p}"),
            None => "no match".to_string(),
        }
    }

    fn find_match(&self, message: &Message) -> Option<RuleMatch> {
        let from_addr = message.from_addr.to_lowercase();
        let address = extract_address(&from_addr);
        let domain = address.as_deref().and_then(extract_domain);

        if let Some(d) = domain
            && self.domains.contains(d)
        {
            return Some(RuleMatch::Domain(d.to_string()));
        }

        if let Some(a) = &address
            && self.addresses.contains(a)
        {
            return Some(RuleMatch::Address(a.clone()));
        }

        for pattern in &self.patterns {
            if pattern.is_match(&from_addr) {
                debug!(sender = %message.from_addr, pattern = %pattern.as_str(), "Sender matched filter pattern");
                return Some(RuleMatch::Pattern(pattern.as_str().to_string()));
            }
        }

        None
    }
}

/// Extract a bare address from a From header.
///
/// `"John Doe <john@example.com>"` → `john@example.com`; a raw header that
/// already contains `@` is treated as a bare address; otherwise no address
/// is extractable and only pattern rules can match.
fn extract_address(from_addr: &str) -> Option<String> {
    if let Some(start) = from_addr.find('<')
        && let Some(end) = from_addr[start + 1..].find('>')
    {
        return Some(from_addr[start + 1..start + 1 + end].to_string());
    }
    if from_addr.contains('@') {
        return Some(from_addr.trim().to_string());
    }
    None
}

/// Domain part of a bare address, when present.
fn extract_domain(address: &str) -> Option<&str> {
    address.split_once('@').map(|(_, domain)| domain)
}
