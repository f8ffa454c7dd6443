//! List checksum verification
//!
//! The declared checksum is the MD5 digest of the list without its
//! `! Checksum:` line, base64 encoded with the padding removed.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use md5::{Digest, Md5};

const CHECKSUM_PREFIX: &str = "! Checksum:";

/// Error type for checksum verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Checksum mismatch: declared={declared}, computed={computed}")]
    Mismatch { declared: String, computed: String },
}

/// Result of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// The list declares no checksum.
    Absent,
    /// The declared checksum matches.
    Verified,
}

fn is_checksum_line(line: &str) -> bool {
    line.trim_start().starts_with(CHECKSUM_PREFIX)
}

/// Find the declared checksum in the leading comment block.
pub fn declared_checksum(text: &str) -> Option<&str> {
    text.lines()
        .skip(1)
        .take_while(|line| line.trim().is_empty() || line.trim_start().starts_with('!'))
        .find(|line| is_checksum_line(line))
        .map(|line| line.trim_start()[CHECKSUM_PREFIX.len()..].trim())
}

/// Compute the checksum of a list, skipping any checksum line.
pub fn compute_checksum(text: &str) -> String {
    let mut hasher = Md5::new();
    for line in text.split_inclusive('\n') {
        if is_checksum_line(line) {
            continue;
        }
        hasher.update(line.as_bytes());
    }
    STANDARD_NO_PAD.encode(hasher.finalize())
}

/// Verify the declared checksum of a list, if it has one.
pub fn verify_checksum(text: &str) -> Result<ChecksumStatus, ChecksumError> {
    let declared = match declared_checksum(text) {
        Some(declared) => declared.trim_end_matches('='),
        None => return Ok(ChecksumStatus::Absent),
    };

    let computed = compute_checksum(text);
    if computed != declared {
        return Err(ChecksumError::Mismatch {
            declared: declared.to_string(),
            computed,
        });
    }

    Ok(ChecksumStatus::Verified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_checksum(body: &str) -> String {
        let checksum = compute_checksum(body);
        let (marker, rest) = body.split_once('\n').unwrap();
        format!("{marker}\n! Checksum: {checksum}\n{rest}")
    }

    #[test]
    fn absent_checksum_is_accepted() {
        assert_eq!(verify_checksum("[Adblock Plus 2.0]\n||a.com^\n"), Ok(ChecksumStatus::Absent));
    }

    #[test]
    fn matching_checksum_verifies() {
        let list = with_checksum("[Adblock Plus 2.0]\n! Title: T\n||a.com^\n");
        assert!(!compute_checksum(&list).ends_with('='));
        assert_eq!(verify_checksum(&list), Ok(ChecksumStatus::Verified));
    }

    #[test]
    fn tampered_body_fails() {
        let list = with_checksum("[Adblock Plus 2.0]\n||a.com^\n");
        let tampered = list.replace("a.com", "b.com");
        assert!(matches!(
            verify_checksum(&tampered),
            Err(ChecksumError::Mismatch { .. })
        ));
    }

    #[test]
    fn known_digest() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(compute_checksum(""), "1B2M2Y8AsgTpgAmY7PhCfg");
        assert_eq!(compute_checksum("! Checksum: x\n"), "1B2M2Y8AsgTpgAmY7PhCfg");
    }
}
