// src/checker/links.rs
// =============================================================================
// This module finds links in page bodies and decides which ones are ours.
//
// Two extraction modes:
// - Regex (default): scans the raw body for anything shaped like an absolute
//   http(s) URL. Finds links in scripts, JSON blobs and plain text too, but
//   never sees relative links.
// - Html: parses the document with `scraper` and reads every <a href>,
//   resolving relative links against the page URL.
//
// Both modes return links de-duplicated in first-seen order.
// =============================================================================

use clap::ValueEnum;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Absolute http(s) URL: scheme, a dotted hostname, then an optional
/// path/query/fragment that does not end in punctuation.
const URL_PATTERN: &str = r"(?:http|https)://[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)+(?:[A-Za-z0-9_.,@?^=%&:/~+#-]*[A-Za-z0-9_@?^=%&/~+#-])?";

/// How links are pulled out of a page body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LinkExtraction {
    /// Match URL-shaped substrings anywhere in the raw body
    #[default]
    Regex,
    /// Parse the HTML and follow <a href> attributes
    Html,
}

/// What to do with a discovered link that does not parse as a URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DomainMatchPolicy {
    /// Unparseable links are treated as foreign and dropped
    #[default]
    FailClosed,
    /// Unparseable links are treated as in-domain
    FailOpen,
}

/// Extracts candidate links from a page body using the given mode
pub fn extract_links(mode: LinkExtraction, body: &str, page_url: &str) -> Vec<String> {
    match mode {
        LinkExtraction::Regex => extract_regex_links(body),
        LinkExtraction::Html => extract_html_links(body, page_url),
    }
}

/// Finds every absolute http(s) URL in raw text
pub fn extract_regex_links(body: &str) -> Vec<String> {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("static URL pattern is valid"));

    dedupe_preserving_order(regex.find_iter(body).map(|m| m.as_str().to_string()))
}

/// Finds every <a href> in an HTML document, resolved to an absolute URL
///
/// Examples (page_url = "https://example.com/page"):
///   href = "/docs"             -> "https://example.com/docs"
///   href = "https://other.com" -> "https://other.com/"
///   href = "mailto:x@y.z"      -> skipped
pub fn extract_html_links(html: &str, page_url: &str) -> Vec<String> {
    static ANCHOR_SELECTOR: OnceLock<Selector> = OnceLock::new();
    let selector = ANCHOR_SELECTOR
        .get_or_init(|| Selector::parse("a[href]").expect("static 'a[href]' CSS selector is valid"));

    // Without a valid page URL we can't resolve relative links
    let base = match Url::parse(page_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(page_url, error = %e, "cannot resolve links against invalid page URL");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);

    let links = document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_url(&base, href))
        .filter(|url| is_http_link(url));

    dedupe_preserving_order(links)
}

/// Drops repeated links, keeping the first occurrence of each
pub fn dedupe_preserving_order<I>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Whether `url`'s hostname is exactly `domain`.
///
/// No subdomain matching and no scheme normalisation: `http://a.com/x`,
/// `https://a.com/x` and `http://a.com:8080/x` all match `a.com`, while
/// `http://www.a.com/x` does not. Links that fail to parse are decided by
/// `policy`.
pub fn url_matches_domain(url: &str, domain: &str, policy: DomainMatchPolicy) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str() == Some(domain),
        Err(_) => policy == DomainMatchPolicy::FailOpen,
    }
}

// Resolves a possibly-relative href against the page URL.
// Fragment-only links point back at the same page and are skipped.
fn resolve_url(base: &Url, href: &str) -> Option<String> {
    if href.starts_with('#') {
        return None;
    }

    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        // Likely relative, try joining with the page URL
        Err(_) => base.join(href).ok().map(|url| url.to_string()),
    }
}

// mailto:, tel:, javascript:, data: ... are not crawlable
fn is_http_link(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
