//! blockwise Core Library
//!
//! This crate provides the core matching engine for the blockwise content
//! blocker: the data structures a parsed filter list turns into, and the
//! decision logic run for every outgoing request.
//!
//! # Architecture
//!
//! Network rules are stored in an arena-backed anchor trie. A request URL is
//! matched by walking the trie from each offset of the URL; every rule met on
//! the way is resolved against the request and the page it belongs to.
//! Cosmetic rules live in two domain → selector maps plus one generic
//! style sheet.
//!
//! # Modules
//!
//! - `types`: Rules, rule options and request views
//! - `url`: Fast URL slicing without allocations
//! - `domain`: Subdomain chains and registrable domains
//! - `trie`: Anchor trie
//! - `cosmetic`: Element hiding maps and style sheet builder
//! - `ruleset`: Fully parsed state of one filter list
//! - `matcher`: Request blocking decision

pub mod cosmetic;
pub mod domain;
pub mod matcher;
pub mod ruleset;
pub mod trie;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use cosmetic::{CosmeticMap, StyleSheetBuilder};
pub use domain::subdomains;
pub use matcher::Matcher;
pub use ruleset::{PageSelectors, RuleSet};
pub use trie::MatchTrie;
pub use types::{Request, RequestHeader, Rule, RuleOptions};
