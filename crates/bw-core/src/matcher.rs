//! Core Matching Engine
//!
//! This is the hot path - every request goes through here.
//!
//! A request URL is matched by walking the anchor trie from every starting
//! offset of the URL. Each rule met along a walk is resolved against the
//! request: `||` host verification, `domain=` lists, then the resource-type
//! options in a fixed order.

use crate::domain::{chain_contains, chain_contains_any, subdomains};
use crate::ruleset::RuleSet;
use crate::types::{Request, Rule, RuleOptions};
use crate::url::{anchor_host, extract_host, extract_path};

/// Extension table used as image evidence.
const IMAGE_SUFFIXES: [&str; 3] = [".png", ".jpg", ".gif"];

// =============================================================================
// Matcher
// =============================================================================

/// The core matching engine for one rule set.
pub struct Matcher<'a> {
    rules: &'a RuleSet,
}

/// Per-request facts shared by every rule resolution.
struct MatchContext<'r> {
    /// Lowercased path, for extension evidence
    path: &'r str,
    /// Subdomain chain of the request host
    req_chain: Vec<&'r str>,
    /// Subdomain chain of the page host
    base_chain: Vec<&'r str>,
    /// Page host
    base_host: &'r str,
    /// Lowercased Accept / Content-Type values
    type_hints: &'r str,
    /// `X-Requested-With: XMLHttpRequest` present
    is_xhr: bool,
}

impl<'a> Matcher<'a> {
    /// Create a new matcher over the given rule set.
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Decide whether a request should be blocked.
    ///
    /// `base_url` is the URL of the page issuing the request; pass an empty
    /// string when unknown. Scheme filtering is left to the caller.
    ///
    /// Every offset of the URL is tried. At one offset, the first rule along
    /// the walk that resolves to a block wins. A resolved exception rule
    /// anywhere in the URL vetoes the block.
    pub fn is_blocked(&self, request: &Request<'_>, base_url: &str) -> bool {
        let trie = self.rules.trie();
        if trie.is_empty() || request.url.is_empty() {
            return false;
        }

        let url = request.url.to_ascii_lowercase();
        let base_url = base_url.to_ascii_lowercase();
        let type_hints = collect_type_hints(request);

        let req_host = extract_host(&url).unwrap_or("");
        let base_host = extract_host(&base_url).unwrap_or("");
        let ctx = MatchContext {
            path: extract_path(&url),
            req_chain: subdomains(req_host),
            base_chain: subdomains(base_host),
            base_host,
            type_hints: &type_hints,
            is_xhr: request
                .header("X-Requested-With")
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("XMLHttpRequest")),
        };

        let bytes = url.as_bytes();
        let scan_exceptions = self.rules.has_exceptions();
        let mut blocked = false;

        for start in 0..bytes.len() {
            for (rule, len) in trie.walk(bytes, start) {
                if blocked && !rule.is_exception {
                    continue;
                }

                let anchor = match url.get(start..start + len) {
                    Some(anchor) => anchor,
                    None => continue,
                };
                if !self.rule_applies(rule, anchor, &ctx) {
                    continue;
                }

                if rule.is_exception {
                    log::trace!("exception rule '{}' allows {}", rule.anchor, request.url);
                    return false;
                }

                log::trace!("rule '{}' blocks {}", rule.anchor, request.url);
                if !scan_exceptions {
                    return true;
                }
                blocked = true;
            }
        }

        blocked
    }

    /// Resolve one candidate rule against the request.
    ///
    /// Returns whether the rule applies: for a blocking rule that means block,
    /// for an exception rule it means allow.
    fn rule_applies(&self, rule: &Rule, anchor: &str, ctx: &MatchContext<'_>) -> bool {
        debug_assert!(!anchor.is_empty());

        if rule.needs_domain_check && !chain_contains(&ctx.req_chain, anchor_host(anchor)) {
            return false;
        }

        let mut applies = true;

        if !rule.exclude_domains.is_empty() && chain_contains_any(&ctx.base_chain, &rule.exclude_domains) {
            applies = false;
        }
        if !rule.include_domains.is_empty() && !chain_contains_any(&ctx.base_chain, &rule.include_domains) {
            applies = false;
        }

        if rule.options.is_empty() {
            return applies;
        }

        resolve_options(rule, ctx, applies)
    }
}

/// Apply resource-type options in their fixed order: third-party, image,
/// script, stylesheet, object, xmlhttprequest. Each step may overwrite the
/// outcome of the previous one.
fn resolve_options(rule: &Rule, ctx: &MatchContext<'_>, mut applies: bool) -> bool {
    let options = rule.options;

    if options.contains(RuleOptions::THIRD_PARTY) {
        let is_third_party = !(ctx.base_host.is_empty() || chain_contains(&ctx.req_chain, ctx.base_host));
        let negated = rule.is_negated(RuleOptions::THIRD_PARTY);
        applies = is_third_party != negated;
    }

    for (option, evidence) in [
        (RuleOptions::IMAGE, has_image_evidence(ctx)),
        (RuleOptions::SCRIPT, has_script_evidence(ctx)),
        (RuleOptions::STYLESHEET, has_stylesheet_evidence(ctx)),
        (RuleOptions::OBJECT, ctx.type_hints.contains("object")),
    ] {
        if options.contains(option) && applies && evidence && rule.is_negated(option) {
            applies = false;
        }
    }

    if options.contains(RuleOptions::XMLHTTPREQUEST) && applies {
        let negated = rule.is_negated(RuleOptions::XMLHTTPREQUEST);
        applies = ctx.is_xhr != negated;
    }

    applies
}

fn has_image_evidence(ctx: &MatchContext<'_>) -> bool {
    ctx.type_hints.contains("image/") || IMAGE_SUFFIXES.iter().any(|suffix| ctx.path.ends_with(suffix))
}

fn has_script_evidence(ctx: &MatchContext<'_>) -> bool {
    ctx.type_hints.contains("script") || ctx.path.ends_with(".js")
}

fn has_stylesheet_evidence(ctx: &MatchContext<'_>) -> bool {
    ctx.type_hints.contains("text/css") || ctx.path.ends_with(".css")
}

/// Lowercased `Accept` and `Content-Type` values joined into one string.
fn collect_type_hints(request: &Request<'_>) -> String {
    let mut hints = String::new();
    for header in request.headers {
        if header.name.eq_ignore_ascii_case("accept") || header.name.eq_ignore_ascii_case("content-type") {
            hints.push_str(&header.value.to_ascii_lowercase());
            hints.push(' ');
        }
    }
    hints
}
