//! Cosmetic (element hiding) rule storage

use std::collections::HashMap;

/// CSS declaration appended once to the combined generic selector list.
pub const HIDE_DECLARATION: &str = "{display:none;}";

/// Multi-valued mapping from domain to CSS selectors.
///
/// Used twice per profile: selectors to hide on a domain (`example.com##.ad`)
/// and selectors to force-show on a domain (`example.com#@#.ad`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CosmeticMap {
    entries: HashMap<String, Vec<String>>,
}

impl CosmeticMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a selector for a domain. Duplicates are kept.
    pub fn insert(&mut self, domain: impl Into<String>, selector: impl Into<String>) {
        self.entries
            .entry(domain.into())
            .or_default()
            .push(selector.into());
    }

    /// Selectors registered for a domain, in insertion order.
    pub fn selectors(&self, domain: &str) -> &[String] {
        self.entries.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append every entry of another map.
    pub fn merge(&mut self, other: &CosmeticMap) {
        for (domain, selectors) in &other.entries {
            self.entries
                .entry(domain.clone())
                .or_default()
                .extend(selectors.iter().cloned());
        }
    }

    /// Iterate over `(domain, selectors)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(domain, selectors)| (domain.as_str(), selectors.as_slice()))
    }

    /// Number of distinct domains.
    pub fn domain_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of `(domain, selector)` pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates generic `##selector` rules into one hiding style sheet.
#[derive(Debug, Clone, Default)]
pub struct StyleSheetBuilder {
    selectors: String,
    count: usize,
}

impl StyleSheetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one generic selector.
    pub fn push(&mut self, selector: &str) {
        let selector = selector.trim();
        if selector.is_empty() {
            return;
        }
        self.selectors.push_str(selector);
        self.selectors.push(',');
        self.count += 1;
    }

    /// Number of selectors added.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Produce `sel1,sel2{display:none;}`, or an empty string when no
    /// selectors were added.
    pub fn build(mut self) -> String {
        if self.selectors.is_empty() {
            return self.selectors;
        }
        self.selectors.pop();
        self.selectors.push_str(HIDE_DECLARATION);
        self.selectors
    }
}
