//! Core type definitions for blockwise
//!
//! These types are produced by the filter list parser and consumed by the
//! trie and the matching engine.

// =============================================================================
// Rule Options (bit flags for resource-type options)
// =============================================================================

bitflags::bitflags! {
    /// Resource-type options of a network rule (`$image`, `$third-party`, ...).
    ///
    /// A rule carries two of these sets: the options it names, and the subset of
    /// those that were negated with `~`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleOptions: u16 {
        const THIRD_PARTY = 1 << 0;
        const STYLESHEET = 1 << 1;
        const IMAGE = 1 << 2;
        const SCRIPT = 1 << 3;
        const OBJECT = 1 << 4;
        /// Recognized but never enforced; rules carrying it are dropped.
        const OBJECT_SUBREQUEST = 1 << 5;
        /// Recognized but never enforced; rules carrying it are dropped.
        const SUBDOCUMENT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;

        /// Options the parser accepts but the engine does not enforce.
        const UNENFORCED = Self::OBJECT_SUBREQUEST.bits() | Self::SUBDOCUMENT.bits();
    }
}

impl RuleOptions {
    /// Parse an option keyword (without the `~` prefix).
    pub fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "third-party" => Some(Self::THIRD_PARTY),
            "stylesheet" => Some(Self::STYLESHEET),
            "image" => Some(Self::IMAGE),
            "script" => Some(Self::SCRIPT),
            "object" => Some(Self::OBJECT),
            "object-subrequest" | "object_subrequest" => Some(Self::OBJECT_SUBREQUEST),
            "subdocument" => Some(Self::SUBDOCUMENT),
            "xmlhttprequest" => Some(Self::XMLHTTPREQUEST),
            _ => None,
        }
    }
}

// =============================================================================
// Rule
// =============================================================================

/// One network rule, owned by the trie node its anchor leads to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rule {
    /// Literal substring used as the trie key (lowercase).
    pub anchor: String,
    /// Resource-type options named by the rule.
    pub options: RuleOptions,
    /// Options that were negated (`~image`).
    pub exception_options: RuleOptions,
    /// Rule began with `@@`.
    pub is_exception: bool,
    /// Rule began with `||`; the anchor must start on a host label.
    pub needs_domain_check: bool,
    /// `domain=a|b`: the rule only applies on pages of these domains.
    pub include_domains: Vec<String>,
    /// `domain=~a`: the rule never applies on pages of these domains.
    pub exclude_domains: Vec<String>,
}

impl Rule {
    /// Create a plain blocking rule for an anchor.
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            ..Self::default()
        }
    }

    /// Whether a named option is negated on this rule.
    #[inline]
    pub fn is_negated(&self, option: RuleOptions) -> bool {
        self.exception_options.contains(option)
    }

    /// Whether the rule has a `domain=` list.
    #[inline]
    pub fn has_domain_constraints(&self) -> bool {
        !self.include_domains.is_empty() || !self.exclude_domains.is_empty()
    }
}

// =============================================================================
// Request
// =============================================================================

/// One request or response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// A request being matched.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// Full request URL
    pub url: &'a str,
    /// Request headers (and response headers when known)
    pub headers: &'a [RequestHeader<'a>],
}

impl<'a> Request<'a> {
    /// Create a request without headers.
    pub fn new(url: &'a str) -> Self {
        Self { url, headers: &[] }
    }

    /// Create a request carrying headers.
    pub fn with_headers(url: &'a str, headers: &'a [RequestHeader<'a>]) -> Self {
        Self { url, headers }
    }

    /// Get the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_keywords() {
        assert_eq!(RuleOptions::from_keyword("image"), Some(RuleOptions::IMAGE));
        assert_eq!(
            RuleOptions::from_keyword("object_subrequest"),
            Some(RuleOptions::OBJECT_SUBREQUEST)
        );
        assert_eq!(RuleOptions::from_keyword("document"), None);
        assert!(RuleOptions::UNENFORCED.contains(RuleOptions::SUBDOCUMENT));
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let headers = [RequestHeader { name: "Accept", value: "image/webp" }];
        let request = Request::with_headers("http://example.com/", &headers);
        assert_eq!(request.header("accept"), Some("image/webp"));
        assert_eq!(request.header("content-type"), None);
    }
}
