// src/checker/mod.rs
// =============================================================================
// This module contains everything that looks at a single URL.
//
// Submodules:
// - fetch: Makes the HTTP request (Fetcher trait + reqwest implementation)
// - links: Pulls links out of page bodies and checks their domain
// - classify: Turns a fetch result into an OK / WARN / ERROR record
//
// The spider module drives the crawl; it only talks to the items re-exported
// here.
// =============================================================================

mod classify;
mod fetch;
mod links;

pub use classify::{classify, LinkFilter};
pub use fetch::{FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use links::{url_matches_domain, DomainMatchPolicy, LinkExtraction};
