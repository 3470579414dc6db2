// src/checker/fetch.rs
// =============================================================================
// This module fetches pages over HTTP.
//
// Key functionality:
// - A small Fetcher trait so the spider can be driven by any HTTP backend
//   (the real one below, or an in-memory one in tests)
// - HttpFetcher: a reqwest-backed implementation with a timeout and a
//   bounded redirect policy
// - Categorizes transport failures (timeout, redirect loop, connection, ...)
//
// Redirects are followed here, so the spider only ever sees the final status.
// =============================================================================

use futures::future::BoxFuture;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Maximum redirect hops before the fetch counts as failed
const MAX_REDIRECTS: usize = 10;

/// A response that made it back to us, whatever its status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    /// Value of the Content-Type header, if the server sent one
    pub content_type: Option<String>,
    /// Response body. Only read for text documents, empty otherwise.
    pub body: String,
}

impl FetchedPage {
    /// Whether the declared content type marks this as a text document.
    ///
    /// A missing header counts as non-text.
    pub fn is_text(&self) -> bool {
        self.content_type
            .as_deref()
            .map(is_text_content_type)
            .unwrap_or(false)
    }
}

/// Why a request never produced a response.
///
/// Every variant ends up as an ERROR record; the distinction is only for logs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("too many redirects")]
    Redirect,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed to read body: {0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

/// Anything that can GET a URL.
///
/// Returns a boxed future so the trait stays object safe and the spider can
/// hold an `Arc<dyn Fetcher>`.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedPage, FetchError>>;
}

/// The real fetcher, backed by a shared reqwest Client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a client with the given per-request timeout.
    ///
    /// The client is reused for every request (connection pooling), and cloning
    /// it is cheap.
    pub fn new(timeout: Duration) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("site-spider/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(categorize_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Only successful text documents get scanned for links, so there is
        // no point downloading anything else
        let wants_body = response.status().is_success()
            && content_type.as_deref().map(is_text_content_type).unwrap_or(false);

        let body = if wants_body {
            response
                .text()
                .await
                .map_err(|e| FetchError::Body(e.to_string()))?
        } else {
            String::new()
        };

        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedPage, FetchError>> {
        Box::pin(self.get(url))
    }
}

/// "text/html", "text/plain; charset=utf-8", ... anything mentioning text
fn is_text_content_type(content_type: &str) -> bool {
    content_type.contains("text")
}

// Maps reqwest's error flags onto our failure categories
fn categorize_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::Redirect
    } else if error.is_connect() {
        FetchError::Connect(error.to_string())
    } else {
        FetchError::Other(error.to_string())
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why BoxFuture instead of `async fn` in the trait?
//    - The spider stores its fetcher as Arc<dyn Fetcher>
//    - Trait objects need a concrete return type, so the future is boxed
//
// 2. What counts as a transport failure?
//    - Anything where reqwest gives up before we have a status code, plus a
//      body that fails to download halfway through
//    - A 404 or 500 is NOT a failure here: it is a response, and the
//      classifier decides what it means
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_is_text() {
        let page = |ct: Option<&str>| FetchedPage {
            status: 200,
            content_type: ct.map(str::to_string),
            body: String::new(),
        };
        assert!(page(Some("text/html; charset=utf-8")).is_text());
        assert!(page(Some("text/plain")).is_text());
        assert!(!page(Some("application/pdf")).is_text());
        assert!(!page(None).is_text());
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<a href=\"/a\">a</a>"),
            )
            .mount(&server)
            .await;

        let page = fetcher().fetch(&server.uri()).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
        assert_eq!(page.body, "<a href=\"/a\">a</a>");
    }

    #[tokio::test]
    async fn test_fetch_skips_body_for_binary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46]),
            )
            .mount(&server)
            .await;

        let url = format!("{}/doc.pdf", server.uri());
        let page = fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_reports_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let page = fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.status, 404);
        assert!(page.body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_error() {
        // Port 1 on localhost has nothing listening
        let result = fetcher().fetch("http://127.0.0.1:1/").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let slow = HttpFetcher::new(Duration::from_millis(200)).unwrap();
        let result = slow.fetch(&server.uri()).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }
}
