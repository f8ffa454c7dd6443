//! blockwise Filter List Compiler
//!
//! This crate turns Adblock-Plus-style filter list text into the structures
//! the core engine matches against.

pub mod builder;
pub mod checksum;
pub mod header;
pub mod parser;

pub use builder::{build_rule_set, BuildStats};
pub use checksum::{compute_checksum, verify_checksum, ChecksumError, ChecksumStatus};
pub use header::{parse_header, HeaderError, ListHeader, FORMAT_MARKER};
pub use parser::{parse_line, ParsedLine, RejectReason};
