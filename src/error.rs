// src/error.rs
// =============================================================================
// Typed errors for the spider's own API.
//
// Fetch failures are NOT in here: a page that cannot be fetched becomes an
// ERROR record in the crawl path and the crawl carries on. These variants
// cover the few things that can actually go wrong for a caller: a domain we
// cannot crawl, misuse of the start/stop lifecycle, and writing the output
// files at shutdown.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpiderError {
    /// The configured root domain has no usable host
    #[error("invalid domain '{0}': {1}")]
    InvalidDomain(String, String),

    /// start() was called on a spider that is running or already ran
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The HTTP client could not be built
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpiderError>;
