//! Subdomain chain construction
//!
//! A host's subdomain chain is every suffix of the host from its registrable
//! domain (eTLD+1) upwards, with the untouched host appended last. The chain
//! is used for third-party detection, `||` anchor verification, `domain=`
//! options and per-page cosmetic selectors.
//!
//! # Examples
//!
//! ```
//! use bw_core::domain::subdomains;
//!
//! assert_eq!(subdomains("ads.example.com"), vec!["example.com", "ads.example.com"]);
//! assert_eq!(
//!     subdomains("a.b.example.co.uk"),
//!     vec!["example.co.uk", "b.example.co.uk", "a.b.example.co.uk"],
//! );
//! ```

/// Common two-part public suffixes.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Get the registrable domain (eTLD+1) of a host as a slice of it.
///
/// Keeps the last two labels, or the last three when the last two form a
/// known two-part public suffix.
pub fn registrable_domain(host: &str) -> &str {
    let host = host.trim_end_matches('.');
    let last = match host.rfind('.') {
        Some(pos) => pos,
        None => return host,
    };
    let second = match host[..last].rfind('.') {
        Some(pos) => pos,
        None => return host,
    };

    let last_two = &host[second + 1..];
    if COMMON_TWO_PART_TLDS.iter().any(|tld| last_two.eq_ignore_ascii_case(tld)) {
        return match host[..second].rfind('.') {
            Some(third) => &host[third + 1..],
            None => host,
        };
    }

    last_two
}

/// Build the subdomain chain of a host.
///
/// The chain starts at the registrable domain and grows one label at a time;
/// the full host is always the last entry. An empty host yields an empty chain.
pub fn subdomains(host: &str) -> Vec<&str> {
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return Vec::new();
    }

    let mut chain = Vec::new();
    let base_len = registrable_domain(host).len();
    let mut end = host.len().saturating_sub(base_len);

    // Walk dots leftwards from the registrable domain, stopping before the host itself.
    while end > 0 {
        chain.push(&host[end..]);
        end = match host[..end - 1].rfind('.') {
            Some(pos) => pos + 1,
            None => 0,
        };
    }

    chain.push(host);
    chain
}

/// Whether a chain contains a domain (ASCII case-insensitive).
#[inline]
pub fn chain_contains(chain: &[&str], domain: &str) -> bool {
    chain.iter().any(|entry| entry.eq_ignore_ascii_case(domain))
}

/// Whether any of the listed domains appears in the chain.
#[inline]
pub fn chain_contains_any(chain: &[&str], domains: &[String]) -> bool {
    domains.iter().any(|domain| chain_contains(chain, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("sub.example.com"), "example.com");
        assert_eq!(registrable_domain("sub.example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }

    #[test]
    fn test_subdomains_keeps_registrable_domain() {
        let chain = subdomains("a.b.example.co.uk");
        assert!(chain.contains(&"example.co.uk"));
        assert!(chain.contains(&"b.example.co.uk"));
        assert!(chain.contains(&"a.b.example.co.uk"));
        assert!(!chain.contains(&"co.uk"));
        assert!(!chain.contains(&"uk"));
    }

    #[test]
    fn test_subdomains_order_and_no_duplicates() {
        assert_eq!(subdomains("example.com"), vec!["example.com"]);
        assert_eq!(
            subdomains("x.ads.example.com"),
            vec!["example.com", "ads.example.com", "x.ads.example.com"]
        );
        assert_eq!(subdomains("localhost"), vec!["localhost"]);
        assert!(subdomains("").is_empty());
    }

    #[test]
    fn test_chain_contains_any() {
        let chain = subdomains("news.example.org");
        let domains = vec!["other.net".to_string(), "EXAMPLE.org".to_string()];
        assert!(chain_contains_any(&chain, &domains));
        assert!(!chain_contains_any(&chain, &["example.net".to_string()]));
    }
}
