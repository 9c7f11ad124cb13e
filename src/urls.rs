//! URL / Asset Extraction
//!
//! Pulls a business's own web address out of free text, skipping
//! aggregator and social domains that are never authoritative.

use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

/// Hosts that never count as a business's own site. Matched as substrings
/// of the lowercased URL.
pub const DENYLISTED_DOMAINS: &[&str] = &[
    // social
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "linkedin.com",
    "tiktok.com",
    "youtube.com",
    "pinterest.com",
    // reviews / directories
    "yelp.",
    "tripadvisor.",
    "google.com/maps",
    "maps.google.",
    "goo.gl",
    "yellowpages.",
    "bbb.org",
    "angi.com",
    "thumbtack.com",
    "nextdoor.com",
    "foursquare.com",
    "mapquest.com",
    "manta.com",
    // shorteners
    "bit.ly",
    "tinyurl.com",
    "ow.ly",
    // delivery / booking platforms
    "doordash.com",
    "ubereats.com",
    "grubhub.com",
    "seamless.com",
    "postmates.com",
    "opentable.com",
    "toasttab.com",
    "vertexaisearch.cloud.google.com",
];

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".avif"];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '>', ']'];

fn re_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'<>()\[\]{}]+"#)
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

pub fn is_denylisted(url: &str) -> bool {
    let lower = url.to_lowercase();
    DENYLISTED_DOMAINS.iter().any(|d| lower.contains(d))
}

/// First URL in `text` that is not on the denylist, trailing punctuation removed.
///
/// Order of appearance decides: callers rely on the first acceptable match.
pub fn extract_first_url(text: &str) -> Option<String> {
    re_url()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|candidate| !is_denylisted(candidate))
        .map(|candidate| candidate.trim_end_matches(TRAILING_PUNCTUATION).to_string())
        .find(|candidate| Url::parse(candidate).map_or(false, |u| u.host_str().is_some()))
}

/// Whether a URL is worth fetching for logo/image analysis.
pub fn looks_like_image_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(u) => u,
        Err(_) => return false,
    };
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return false;
    }

    let path = parsed.path().to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || path.contains("logo")
        || path.contains("brand")
}
