//! Filter list header parsing
//!
//! A list starts with a version marker line followed by `!` comment lines
//! carrying metadata:
//!
//! ```text
//! [Adblock Plus 2.0]
//! ! Checksum: X5A8vtJDBW2a9EgS/glqpw
//! ! Title: EasyList
//! ! Expires: 4 days (update frequency)
//! ! URL: https://easylist.to/easylist/easylist.txt
//! ! Last modified: 18 Oct 2026 10:00 UTC
//! ```

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Prefix every accepted list must start with.
pub const FORMAT_MARKER: &str = "[Adblock Plus 2.";

const LAST_MODIFIED_FORMAT: &str = "%d %b %Y %H:%M";

/// Error type for header parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("List is empty")]
    Empty,
    #[error("Missing format marker, first line is '{0}'")]
    MissingMarker(String),
}

/// Metadata read from a list header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListHeader {
    pub title: Option<String>,
    pub expires_days: Option<u32>,
    pub update_url: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    /// No rule line follows the header comments.
    pub body_empty: bool,
}

/// Header keys this parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKey {
    Title,
    Expires,
    Url,
    LastModified,
    Checksum,
}

/// Split a `! Key: value` comment line into a known key and its value.
fn header_field(line: &str) -> Option<(HeaderKey, &str)> {
    let comment = line.trim().strip_prefix('!')?;
    let (key, value) = comment.split_once(':')?;
    let key: String = key
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let key = match key.as_str() {
        "title" => HeaderKey::Title,
        "expires" => HeaderKey::Expires,
        "url" => HeaderKey::Url,
        "lastmodified" => HeaderKey::LastModified,
        "checksum" => HeaderKey::Checksum,
        _ => return None,
    };
    Some((key, value.trim()))
}

/// Whether the first line carries the format marker.
pub fn has_format_marker(first_line: &str) -> bool {
    first_line.trim().starts_with(FORMAT_MARKER)
}

/// Parse the header of a list.
///
/// Only the leading comment block is read; parsing stops at the first rule
/// line.
pub fn parse_header(text: &str) -> Result<ListHeader, HeaderError> {
    let mut lines = text.lines();
    let first = lines.next().ok_or(HeaderError::Empty)?;
    if !has_format_marker(first) {
        let mut shown: String = first.trim().chars().take(64).collect();
        if shown.is_empty() {
            shown.push_str("<blank>");
        }
        return Err(HeaderError::MissingMarker(shown));
    }

    let mut header = ListHeader {
        body_empty: true,
        ..ListHeader::default()
    };

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('!') {
            header.body_empty = false;
            break;
        }

        let (key, value) = match header_field(line) {
            Some(field) => field,
            None => continue,
        };

        match key {
            HeaderKey::Title => header.title = Some(value.to_string()),
            HeaderKey::Expires => header.expires_days = parse_expires(value),
            HeaderKey::Url => {
                if !value.is_empty() {
                    header.update_url = Some(value.to_string());
                }
            }
            HeaderKey::LastModified => {
                header.last_modified = parse_last_modified(value);
                if header.last_modified.is_none() {
                    log::debug!("Unparsable last-modified date '{}'", value);
                }
            }
            HeaderKey::Checksum => header.checksum = Some(value.to_string()),
        }
    }

    Ok(header)
}

/// Parse `4 days (update frequency)` or `12 hours` into whole days.
pub fn parse_expires(value: &str) -> Option<u32> {
    let mut parts = value.split_whitespace();
    let amount: u32 = parts.next()?.parse().ok()?;
    let unit = parts.next().unwrap_or("days").to_ascii_lowercase();

    if unit.starts_with("hour") {
        Some(amount.div_ceil(24).max(1))
    } else {
        Some(amount)
    }
}

/// Parse `18 Oct 2026 10:00 UTC`.
pub fn parse_last_modified(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = value.strip_suffix("UTC").unwrap_or(value).trim();
    NaiveDateTime::parse_from_str(value, LAST_MODIFIED_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Format a timestamp the way `parse_last_modified` reads it.
pub fn format_last_modified(time: DateTime<Utc>) -> String {
    format!("{} UTC", time.format(LAST_MODIFIED_FORMAT))
}

/// Whether more than `expires_days` whole days passed since `last_modified`.
pub fn is_expired(last_modified: DateTime<Utc>, expires_days: u32, now: DateTime<Utc>) -> bool {
    (now - last_modified).num_days() > i64::from(expires_days)
}

/// Rewrite a downloaded list for local storage.
///
/// Inserts `! URL:` after the marker line and `! Last modified:` after that
/// when the download carries neither; every other line is kept as is.
pub fn rewrite_list(text: &str, update_url: &str, now: DateTime<Utc>) -> String {
    let mut lines = text.split_inclusive('\n');
    let marker = lines.next().unwrap_or("");
    let rest = &text[marker.len()..];

    let mut has_url = false;
    let mut has_last_modified = false;
    for line in rest.lines() {
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('!') {
            break;
        }
        match header_field(line) {
            Some((HeaderKey::Url, _)) => has_url = true,
            Some((HeaderKey::LastModified, _)) => has_last_modified = true,
            _ => {}
        }
    }

    let mut out = String::with_capacity(text.len() + 128);
    out.push_str(marker.trim_end_matches(['\r', '\n']));
    out.push('\n');
    if !has_url {
        out.push_str(&format!("! URL: {}\n", update_url));
    }
    if !has_last_modified {
        out.push_str(&format!("! Last modified: {}\n", format_last_modified(now)));
    }
    out.push_str(rest);
    out
}
