//! Payload classification against known attack patterns

use anyhow::{Context, Result};
use regex::{RegexSet, RegexSetBuilder};

/// Stateless predicate over captured payload text.
///
/// Rules are compiled once at startup; a bad pattern is a configuration
/// error, never a runtime one.
pub struct Classifier {
    rules: RegexSet,
}

impl Classifier {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let rules = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()
            .context("invalid classifier pattern")?;
        Ok(Self { rules })
    }

    /// True if any rule matches. Empty payloads are never suspicious.
    pub fn is_suspicious(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.rules.is_match(text)
    }
}
