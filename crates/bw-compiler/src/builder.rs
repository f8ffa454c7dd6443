use bw_core::cosmetic::{CosmeticMap, StyleSheetBuilder};
use bw_core::ruleset::RuleSet;
use bw_core::trie::MatchTrie;

use crate::header::has_format_marker;
use crate::parser::{parse_line, ParsedLine};

/// Counters collected while building a rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub lines: usize,
    pub network_rules: usize,
    pub exception_rules: usize,
    /// Network rules whose anchor replaced an earlier rule.
    pub replaced_rules: usize,
    pub generic_hide: usize,
    pub hide_entries: usize,
    pub unhide_entries: usize,
    pub ignored: usize,
    pub rejected: usize,
}

/// Build a rule set from the text of a filter list.
///
/// The format marker line is skipped when present; header validation is the
/// caller's job. Rejected lines are dropped and counted.
pub fn build_rule_set(text: &str) -> (RuleSet, BuildStats) {
    let mut stats = BuildStats::default();
    let mut trie = MatchTrie::new();
    let mut hide = CosmeticMap::new();
    let mut unhide = CosmeticMap::new();
    let mut style_sheet = StyleSheetBuilder::new();

    let mut lines = text.lines().peekable();
    if lines.peek().is_some_and(|first| has_format_marker(first)) {
        lines.next();
    }

    for line in lines {
        stats.lines += 1;

        match parse_line(line) {
            ParsedLine::Ignored => stats.ignored += 1,
            ParsedLine::Network(rule) => {
                if rule.is_exception {
                    stats.exception_rules += 1;
                }
                stats.network_rules += 1;

                let before = trie.len();
                trie.insert(rule);
                if trie.len() == before {
                    stats.replaced_rules += 1;
                }
            }
            ParsedLine::GenericHide(selector) => {
                stats.generic_hide += 1;
                style_sheet.push(&selector);
            }
            ParsedLine::Hide { domains, selector } => {
                for domain in domains {
                    stats.hide_entries += 1;
                    hide.insert(domain, selector.as_str());
                }
            }
            ParsedLine::Unhide { domains, selector } => {
                for domain in domains {
                    stats.unhide_entries += 1;
                    unhide.insert(domain, selector.as_str());
                }
            }
            ParsedLine::Rejected(reason) => {
                stats.rejected += 1;
                log::debug!("Dropped filter line '{}': {:?}", line.trim(), reason);
            }
        }
    }

    let rule_set = RuleSet::new(trie, hide, unhide, style_sheet.build());
    (rule_set, stats)
}
