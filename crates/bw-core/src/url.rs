//! Fast URL slicing utilities for the hot path
//!
//! These functions avoid allocations and work directly on string slices.

// =============================================================================
// Scheme Extraction
// =============================================================================

/// URL schemes the engine filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

/// Fast scheme extraction without URL parsing.
/// Returns None for anything but `http://` and `https://`.
#[inline]
pub fn extract_scheme(url: &str) -> Option<Scheme> {
    let bytes = url.as_bytes();
    if bytes.len() >= 8 && bytes[..8].eq_ignore_ascii_case(b"https://") {
        Some(Scheme::Https)
    } else if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"http://") {
        Some(Scheme::Http)
    } else {
        None
    }
}

/// Whether the URL is `http` or `https`.
#[inline]
pub fn is_http_scheme(url: &str) -> bool {
    extract_scheme(url).is_some()
}

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    // Find ':'
    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    // Check for "://"
    if bytes.len() > colon_pos + 2
        && bytes[colon_pos + 1] == b'/'
        && bytes[colon_pos + 2] == b'/'
    {
        return Some(colon_pos + 3);
    }

    None
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' {
            break;
        }
    }

    // Find host end
    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

// =============================================================================
// Path Extraction
// =============================================================================

/// Extract the path portion of a URL.
#[inline]
pub fn extract_path(url: &str) -> &str {
    let scheme_end = match get_scheme_end(url) {
        Some(pos) => pos,
        None => return "/",
    };

    let bytes = url.as_bytes();

    // Find path start (first '/' after host)
    let mut path_start = None;
    for (i, &b) in bytes[scheme_end..].iter().enumerate() {
        if b == b'/' {
            path_start = Some(scheme_end + i);
            break;
        }
        if b == b'?' || b == b'#' {
            return "/";
        }
    }

    let path_start = match path_start {
        Some(pos) => pos,
        None => return "/",
    };

    // Find path end
    let mut path_end = bytes.len();
    for (i, &b) in bytes[path_start..].iter().enumerate() {
        if b == b'?' || b == b'#' {
            path_end = path_start + i;
            break;
        }
    }

    &url[path_start..path_end]
}

// =============================================================================
// Anchor Host
// =============================================================================

/// Characters that end the host part of a `||` anchor.
const ANCHOR_DELIMITERS: [char; 5] = [':', '?', '&', '/', '='];

/// Truncate a matched anchor at its first delimiter, leaving the host part.
///
/// `ads.example.com/ok` becomes `ads.example.com`.
#[inline]
pub fn anchor_host(anchor: &str) -> &str {
    match anchor.find(ANCHOR_DELIMITERS) {
        Some(pos) => &anchor[..pos],
        None => anchor,
    }
}
