// src/checker/classify.rs
// =============================================================================
// Turns the result of one fetch into a CrawlRecord.
//
// Rules:
// - transport failure            -> ERROR, status 0
// - status outside 200..=299     -> WARN, actual status
// - 2xx but not a text document  -> OK, no links
// - 2xx text document            -> OK, in-domain links not yet visited
//
// This is a pure function: the same fetch result, visited set and domain
// always give the same record.
// =============================================================================

use super::fetch::{FetchError, FetchedPage};
use super::links::{extract_links, url_matches_domain, DomainMatchPolicy, LinkExtraction};
use crate::spider::CrawlRecord;
use std::collections::HashSet;

/// Everything besides the response that decides which links survive
#[derive(Debug, Clone, Copy)]
pub struct LinkFilter<'a> {
    /// Hostname every followed link must have
    pub domain: &'a str,
    /// URLs already queued for fetch
    pub visited: &'a HashSet<String>,
    pub extraction: LinkExtraction,
    pub policy: DomainMatchPolicy,
}

/// Classifies a fetch result
pub fn classify(
    url: &str,
    result: &Result<FetchedPage, FetchError>,
    filter: LinkFilter<'_>,
) -> CrawlRecord {
    let page = match result {
        Ok(page) => page,
        Err(_) => return CrawlRecord::error(url),
    };

    if !(200..=299).contains(&page.status) {
        return CrawlRecord::warn(url, page.status);
    }

    if !page.is_text() {
        return CrawlRecord::ok(url, page.status, Vec::new());
    }

    let next = extract_links(filter.extraction, &page.body, url)
        .into_iter()
        .filter(|link| !filter.visited.contains(link))
        .filter(|link| url_matches_domain(link, filter.domain, filter.policy))
        .collect();

    CrawlRecord::ok(url, page.status, next)
}
