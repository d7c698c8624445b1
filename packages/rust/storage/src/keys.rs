//! Cache key normalization.
//!
//! Trivial variations of the same query or URL must hit the same cache
//! entry, so every key is normalized before it reaches the database.

use sha2::{Digest, Sha256};
use url::Url;

/// Lowercase, trim, and collapse internal whitespace.
fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Key for the search namespace: hash of the normalized query string.
pub fn query_key(query: &str) -> String {
    sha256_hex(&normalize_text(query))
}

/// Canonical form of a URL: lowercased scheme and host, no fragment, no
/// trailing slash. Falls back to trimmed input when the URL does not parse.
pub fn canonical_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut s = url.to_string();
            while s.ends_with('/') {
                s.pop();
            }
            s
        }
        Err(_) => raw.trim().trim_end_matches('/').to_string(),
    }
}

/// Key for the scrape namespace: hash of the canonical URL. Shared across
/// companies that surface the same page.
pub fn url_key(raw: &str) -> String {
    sha256_hex(&canonical_url(raw))
}

/// Key for the company namespace: the normalized name itself, kept
/// readable so cached companies can be listed.
pub fn company_key(name: &str) -> String {
    normalize_text(name)
}

/// Key for the person namespace: hash of `name@company`, both normalized.
pub fn person_key(name: &str, company: &str) -> String {
    sha256_hex(&format!(
        "{}@{}",
        normalize_text(name),
        normalize_text(company)
    ))
}
