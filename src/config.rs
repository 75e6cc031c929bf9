//! Configuration types.
//!
//! Locating and reading config files belongs to the embedding binary; this
//! crate only defines the deserializable shapes.

use serde::{Deserialize, Serialize};

/// Sync run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How far back to look when no last-sync timestamp exists.
    pub days_lookback: i64,
    /// Maximum messages fetched per run.
    pub max_messages: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            days_lookback: 7,
            max_messages: 50,
        }
    }
}

/// Filter mode: how a rule match translates into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Default allow; a rule match means skip.
    #[default]
    Blocklist,
    /// Default deny; a rule match means process.
    Allowlist,
}

/// Pre-classification filter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: FilterMode,
    /// Exact sender domains, e.g. "linkedin.com".
    pub domains: Vec<String>,
    /// Exact sender addresses, e.g. "noreply@example.com".
    pub addresses: Vec<String>,
    /// Regex patterns matched against the raw From header.
    pub patterns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_defaults() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.days_lookback, 7);
        assert_eq!(cfg.max_messages, 50);
    }

    #[test]
    fn filter_config_from_json() {
        let cfg: FilterConfig = serde_json::from_str(
            r#"{"mode":"allowlist","domains":["work.com"],"patterns":["^newsletter"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, FilterMode::Allowlist);
        assert_eq!(cfg.domains, vec!["work.com"]);
        assert_eq!(cfg.patterns, vec!["^newsletter"]);
        assert!(cfg.addresses.is_empty());
    }

    #[test]
    fn filter_config_defaults_to_blocklist() {
        let cfg: FilterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.mode, FilterMode::Blocklist);
    }
}
