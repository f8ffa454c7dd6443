use bw_core::types::{Rule, RuleOptions};

/// Outcome of parsing one filter list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Comment, metadata or blank line.
    Ignored,
    /// Network rule ready for the trie.
    Network(Rule),
    /// `##selector`, applied on every page.
    GenericHide(String),
    /// `a.com,b.com##selector`
    Hide { domains: Vec<String>, selector: String },
    /// `a.com#@#selector`
    Unhide { domains: Vec<String>, selector: String },
    /// Line the engine cannot express; dropped.
    Rejected(RejectReason),
}

/// Why a line was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Pattern still contains `*` or `^` after anchor stripping.
    Wildcard,
    /// Nothing left to match on.
    EmptyPattern,
    /// Option keyword the engine does not know (`document`, `elemhide`, ...).
    UnknownOption(String),
    /// Option recognized but not enforced (`subdocument`, `object-subrequest`).
    UnenforcedOption(RuleOptions),
    /// `domain=` value that is not a plain host name.
    InvalidDomain(String),
    /// Extended cosmetic syntax (`#?#`, `#$#`).
    UnsupportedCosmetic,
}

const GENERIC_HIDE_PREFIX: &str = "##";
const HIDE_SEPARATOR: &str = "##";
const UNHIDE_SEPARATOR: &str = "#@#";

/// Parse one filter list line.
///
/// Pure and stateless: the caller decides where the result goes.
pub fn parse_line(raw_line: &str) -> ParsedLine {
    let line = raw_line.trim();
    if line.is_empty() || is_comment_line(line) {
        return ParsedLine::Ignored;
    }

    if line.contains("#?#") || line.contains("#$#") || line.contains("#@?#") {
        return ParsedLine::Rejected(RejectReason::UnsupportedCosmetic);
    }

    if let Some(selector) = line.strip_prefix(GENERIC_HIDE_PREFIX) {
        return parse_generic_hide(selector);
    }

    if let Some((pos, separator, is_unhide)) = find_cosmetic_separator(line) {
        return parse_cosmetic(&line[..pos], &line[pos + separator.len()..], is_unhide);
    }

    match parse_network_rule(line) {
        Ok(rule) => ParsedLine::Network(rule),
        Err(reason) => ParsedLine::Rejected(reason),
    }
}

/// Earliest `##` or `#@#` in the line. `example.com#@##id` is an unhide rule
/// for the selector `#id`.
fn find_cosmetic_separator(line: &str) -> Option<(usize, &'static str, bool)> {
    let hide = line.find(HIDE_SEPARATOR).map(|pos| (pos, HIDE_SEPARATOR, false));
    let unhide = line.find(UNHIDE_SEPARATOR).map(|pos| (pos, UNHIDE_SEPARATOR, true));
    match (hide, unhide) {
        (Some(hide), Some(unhide)) => Some(if unhide.0 < hide.0 { unhide } else { hide }),
        (hide, unhide) => hide.or(unhide),
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

// =============================================================================
// Cosmetic rules
// =============================================================================

fn parse_generic_hide(selector: &str) -> ParsedLine {
    let selector = selector.trim();
    if selector.is_empty() {
        return ParsedLine::Ignored;
    }
    ParsedLine::GenericHide(selector.to_string())
}

fn parse_cosmetic(domains_text: &str, selector: &str, is_unhide: bool) -> ParsedLine {
    let selector = selector.trim();
    if selector.is_empty() {
        return ParsedLine::Ignored;
    }

    let entries: Vec<&str> = domains_text
        .split(',')
        .map(str::trim)
        .filter(|domain| !domain.is_empty())
        .collect();

    // `~domain` scoping is not modeled; negated entries are skipped.
    let domains: Vec<String> = entries
        .iter()
        .filter(|domain| !domain.starts_with('~'))
        .map(|domain| domain.to_ascii_lowercase())
        .collect();

    if domains.is_empty() && !entries.is_empty() {
        return ParsedLine::Ignored;
    }

    if domains.is_empty() {
        return if is_unhide {
            ParsedLine::Ignored
        } else {
            ParsedLine::GenericHide(selector.to_string())
        };
    }

    let selector = selector.to_string();
    if is_unhide {
        ParsedLine::Unhide { domains, selector }
    } else {
        ParsedLine::Hide { domains, selector }
    }
}

// =============================================================================
// Network rules
// =============================================================================

fn parse_network_rule(line: &str) -> Result<Rule, RejectReason> {
    let (pattern_part, options_text) = split_rule_options(line);

    let mut pattern = pattern_part.trim().trim_end_matches(['|', '*', '^']);
    if let Some(rest) = pattern.strip_prefix('*') {
        pattern = rest;
    }

    if pattern.contains(['*', '^']) {
        return Err(RejectReason::Wildcard);
    }

    let mut rule = Rule::default();

    if let Some(rest) = pattern.strip_prefix("@@") {
        rule.is_exception = true;
        pattern = rest;
    }

    if let Some(rest) = pattern.strip_prefix("||") {
        rule.needs_domain_check = true;
        pattern = rest;
    } else if let Some(rest) = pattern.strip_prefix('|') {
        // Start anchor; matched as a plain substring.
        pattern = rest;
    }

    if pattern.is_empty() {
        return Err(RejectReason::EmptyPattern);
    }

    if let Some(options_text) = options_text {
        apply_options(&mut rule, options_text)?;
    }

    rule.anchor = pattern.to_ascii_lowercase();
    Ok(rule)
}

/// Split at the last unescaped `$`.
fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let separator = (0..bytes.len())
        .rev()
        .find(|&pos| bytes[pos] == b'$' && (pos == 0 || bytes[pos - 1] != b'\\'));

    match separator {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

fn apply_options(rule: &mut Rule, text: &str) -> Result<(), RejectReason> {
    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();

        if let Some(domain_value) = raw_lower.strip_prefix("domain=") {
            parse_domain_option(rule, domain_value)?;
            continue;
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower.as_str()),
        };

        let option = match RuleOptions::from_keyword(name) {
            Some(option) => option,
            None => return Err(RejectReason::UnknownOption(name.to_string())),
        };

        if RuleOptions::UNENFORCED.contains(option) {
            return Err(RejectReason::UnenforcedOption(option));
        }

        rule.options |= option;
        if negated {
            rule.exception_options |= option;
        }
    }

    Ok(())
}

fn parse_domain_option(rule: &mut Rule, value: &str) -> Result<(), RejectReason> {
    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let domain = normalize_domain(domain_raw)
            .ok_or_else(|| RejectReason::InvalidDomain(domain_raw.to_string()))?;

        if is_exclude {
            rule.exclude_domains.push(domain);
        } else {
            rule.include_domains.push(domain);
        }
    }

    Ok(())
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}
