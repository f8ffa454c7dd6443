//! Parsed state of one filter list

use crate::cosmetic::CosmeticMap;
use crate::domain::subdomains;
use crate::trie::MatchTrie;

/// Everything a filter list contributes once fully parsed: the network rule
/// trie, the two cosmetic maps and the generic hiding style sheet.
///
/// A rule set is immutable once built. Profiles replace it wholesale.
#[derive(Debug, Default)]
pub struct RuleSet {
    trie: MatchTrie,
    hide: CosmeticMap,
    unhide: CosmeticMap,
    style_sheet: String,
    has_exceptions: bool,
}

/// Cosmetic selectors that apply to one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelectors {
    /// Selectors to hide.
    pub hide: Vec<String>,
    /// Selectors to force-show, overriding `hide`.
    pub unhide: Vec<String>,
}

impl PageSelectors {
    /// Append another set of page selectors.
    pub fn extend(&mut self, other: PageSelectors) {
        self.hide.extend(other.hide);
        self.unhide.extend(other.unhide);
    }
}

impl RuleSet {
    pub fn new(trie: MatchTrie, hide: CosmeticMap, unhide: CosmeticMap, style_sheet: String) -> Self {
        let has_exceptions = trie.rules().any(|rule| rule.is_exception);
        Self {
            trie,
            hide,
            unhide,
            style_sheet,
            has_exceptions,
        }
    }

    /// A rule set that never blocks and never hides.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn trie(&self) -> &MatchTrie {
        &self.trie
    }

    /// Domain-scoped selectors to hide.
    pub fn hide_map(&self) -> &CosmeticMap {
        &self.hide
    }

    /// Domain-scoped selectors to force-show.
    pub fn unhide_map(&self) -> &CosmeticMap {
        &self.unhide
    }

    /// Combined generic hiding style sheet (may be empty).
    pub fn style_sheet(&self) -> &str {
        &self.style_sheet
    }

    /// Whether any `@@` rule is stored.
    pub fn has_exceptions(&self) -> bool {
        self.has_exceptions
    }

    /// Collect the selectors registered for every entry of the page host's
    /// subdomain chain.
    pub fn page_selectors(&self, page_host: &str) -> PageSelectors {
        let host = page_host.to_ascii_lowercase();
        let mut selectors = PageSelectors::default();
        for domain in subdomains(&host) {
            selectors.hide.extend(self.hide.selectors(domain).iter().cloned());
            selectors.unhide.extend(self.unhide.selectors(domain).iter().cloned());
        }
        selectors
    }
}
