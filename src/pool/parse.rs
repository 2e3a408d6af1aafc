//! Candidate extraction from raw provider responses
//!
//! Provider responses are usually newline-delimited `IP:PORT` lists, but some
//! free sources wrap the entries in HTML. Parsing tries line-by-line extraction
//! first and falls back to regex scanning of the whole body.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches IP:PORT patterns embedded in arbitrary text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Parse a single candidate line into a canonical `host:port` string
///
/// Accepts bare `host:port` entries and scheme-prefixed variants
/// (`http://host:port`). Empty lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    // Strip a scheme prefix if present
    let line = line
        .strip_prefix("http://")
        .or_else(|| line.strip_prefix("https://"))
        .or_else(|| line.strip_prefix("socks4://"))
        .or_else(|| line.strip_prefix("socks5://"))
        .unwrap_or(line)
        .trim_end_matches('/');

    let (host, port) = line.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    if port == 0 {
        return None;
    }

    Some(format!("{}:{}", host, port))
}

/// Extract `host:port` candidates from a provider response body
///
/// Tries line-by-line parsing first; if nothing parses (HTML sources), falls
/// back to regex extraction. The result is sorted and deduplicated.
pub fn parse_candidates(content: &str) -> Vec<String> {
    let mut candidates: Vec<String> = content.lines().filter_map(parse_line).collect();

    if candidates.is_empty() {
        candidates = extract_with_regex(content);
    }

    candidates.sort();
    candidates.dedup();
    candidates
}

/// Regex-based extraction with IP octet and port validation
fn extract_with_regex(content: &str) -> Vec<String> {
    IP_PORT_REGEX
        .captures_iter(content)
        .filter_map(|cap| {
            let host = cap.get(1)?.as_str();
            let port: u16 = cap.get(2)?.as_str().parse().ok()?;

            for part in host.split('.') {
                let octet: u32 = part.parse().ok()?;
                if octet > 255 {
                    return None;
                }
            }

            if port == 0 {
                return None;
            }

            Some(format!("{}:{}", host, port))
        })
        .collect()
}
