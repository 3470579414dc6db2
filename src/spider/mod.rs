// src/spider/mod.rs
// =============================================================================
// The crawl driver.
//
// How it works:
// 1. start() marks the spider as running and crawls the root page
//    (http:// + the configured host, no path)
// 2. Every crawl spawns its own task: fetch the page, record the outcome,
//    then crawl each in-domain link the page revealed
// 3. Nobody waits for those child crawls, they report back by appending to
//    the shared crawl path and report as they finish
// 4. stop() flips the running flag so no new crawl gets dispatched. Fetches
//    already on the wire still finish and get recorded; crawls still waiting
//    for a request slot give up without sending anything.
//
// There is no queue and no depth limit: the frontier only exists as the
// arguments of the tasks in flight. The crawl ends when a stop() arrives or
// when no task is left.
//
// De-duplication is best effort. A URL is marked visited when its fetch
// begins, so two pages that reveal the same link before either fetch has
// begun will both crawl it. The second fetch is recorded like any other.
// =============================================================================

mod record;

pub use record::{CrawlRecord, Outcome, Report};

use crate::checker::{
    classify, DomainMatchPolicy, FetchError, FetchedPage, Fetcher, LinkExtraction, LinkFilter,
};
use crate::error::{Result, SpiderError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on requests on the wire at the same time
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// How the spider is set up
#[derive(Debug, Clone)]
pub struct SpiderSettings {
    /// Root of the site: a bare host ("example.com", "localhost:8080")
    /// or a full URL, of which only the host and port are kept
    pub domain: String,
    pub extraction: LinkExtraction,
    pub domain_policy: DomainMatchPolicy,
    /// Requests allowed in flight at once. Crawls beyond that wait for a slot.
    pub max_concurrency: usize,
}

impl SpiderSettings {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            extraction: LinkExtraction::default(),
            domain_policy: DomainMatchPolicy::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

// Everything the crawl mutates. One lock guards all three so a record and
// its report entry always land together.
#[derive(Debug, Default)]
struct CrawlState {
    visited: HashSet<String>,
    crawl_path: Vec<CrawlRecord>,
    report: Report,
}

struct Inner {
    domain: String,
    root_url: String,
    extraction: LinkExtraction,
    domain_policy: DomainMatchPolicy,
    fetcher: Arc<dyn Fetcher>,
    permits: Semaphore,
    running: AtomicBool,
    started: AtomicBool,
    /// Number of crawl tasks spawned and not yet finished
    in_flight: watch::Sender<usize>,
    state: Mutex<CrawlState>,
}

/// A single-domain crawler.
///
/// Cloning is cheap and every clone drives the same crawl.
#[derive(Clone)]
pub struct Spider {
    inner: Arc<Inner>,
}

impl Spider {
    /// Creates a stopped spider for the configured domain
    pub fn new(settings: SpiderSettings, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let (domain, root_url) = parse_root(&settings.domain)?;
        let (in_flight, _) = watch::channel(0);

        Ok(Self {
            inner: Arc::new(Inner {
                domain,
                root_url,
                extraction: settings.extraction,
                domain_policy: settings.domain_policy,
                fetcher,
                permits: Semaphore::new(settings.max_concurrency.max(1)),
                running: AtomicBool::new(false),
                started: AtomicBool::new(false),
                in_flight,
                state: Mutex::new(CrawlState::default()),
            }),
        })
    }

    /// Hostname every followed link must have
    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    /// The first page crawled
    pub fn root_url(&self) -> &str {
        &self.inner.root_url
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Starts crawling from the root page.
    ///
    /// Returns right away; the crawl continues on spawned tasks, so this must
    /// be called from inside a Tokio runtime. A spider runs once: calling
    /// start() again, while running or after stop(), is refused with
    /// `SpiderError::InvalidState`.
    pub fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(SpiderError::InvalidState("spider has already been started"));
        }

        info!(domain = %self.inner.domain, "Starting...");
        self.inner.running.store(true, Ordering::SeqCst);

        info!(url = %self.inner.root_url, "Crawling root page...");
        self.crawl(self.inner.root_url.clone());
        Ok(())
    }

    /// Stops dispatching new crawls.
    ///
    /// Does not cancel or wait for fetches already in flight; they still get
    /// recorded when they complete. Crawls queued behind the concurrency cap
    /// are dropped before their request is sent.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Stopped.");
    }

    /// True when no crawl task is in flight
    pub fn is_idle(&self) -> bool {
        *self.inner.in_flight.borrow() == 0
    }

    /// Resolves once no crawl task is in flight, i.e. the frontier ran dry
    /// or everything dispatched before stop() has been recorded.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        // The sender lives in `inner`, which we hold, so this cannot fail
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Every fetch attempt so far, in completion order
    pub async fn crawl_path(&self) -> Vec<CrawlRecord> {
        self.inner.state.lock().await.crawl_path.clone()
    }

    /// Visited URLs by outcome
    pub async fn report(&self) -> Report {
        self.inner.state.lock().await.report.clone()
    }

    /// Crawl path and report taken under the same lock, so they agree
    pub async fn snapshot(&self) -> (Vec<CrawlRecord>, Report) {
        let state = self.inner.state.lock().await;
        (state.crawl_path.clone(), state.report.clone())
    }

    /// Whether `url` belongs to the crawled domain, under the configured
    /// policy for links that don't parse
    pub fn url_matches_domain(&self, url: &str) -> bool {
        crate::checker::url_matches_domain(url, &self.inner.domain, self.inner.domain_policy)
    }

    // Dispatches a crawl of `url` on its own task, unless we've been stopped.
    // The caller never waits for it.
    fn crawl(&self, url: String) {
        if !self.is_running() {
            debug!(%url, "spider stopped, not crawling");
            return;
        }

        self.inner.in_flight.send_modify(|count| *count += 1);

        let spider = self.clone();
        tokio::spawn(async move {
            if let Some(record) = spider.fetch_and_record(&url).await {
                for link in record.links_to_follow() {
                    spider.crawl(link.clone());
                }
            }

            spider.inner.in_flight.send_modify(|count| *count -= 1);
        });
    }

    /// Fetches `url`, appends the record to the crawl path and report, and
    /// returns it. None if the spider was stopped before the request went out.
    async fn fetch_and_record(&self, url: &str) -> Option<CrawlRecord> {
        let record = self.fetch_one(url).await?;

        debug!(url, outcome = %record.outcome, status = record.status, "Recording");

        let mut state = self.inner.state.lock().await;
        state.report.push(&record);
        state.crawl_path.push(record.clone());

        Some(record)
    }

    /// Fetches and classifies a single URL.
    ///
    /// Returns None without sending anything if stop() arrived while this
    /// crawl was waiting for a request slot.
    async fn fetch_one(&self, url: &str) -> Option<CrawlRecord> {
        // Mark before the request goes out so pages finishing in the meantime
        // don't hand this URL out again
        self.inner.state.lock().await.visited.insert(url.to_string());

        debug!(url, "Working on");

        let result = {
            let _permit = self.inner.permits.acquire().await.ok();
            if !self.is_running() {
                debug!(url, "spider stopped while waiting for a slot, not fetching");
                return None;
            }
            self.inner.fetcher.fetch(url).await
        };

        let record = {
            let state = self.inner.state.lock().await;
            classify(
                url,
                &result,
                LinkFilter {
                    domain: &self.inner.domain,
                    visited: &state.visited,
                    extraction: self.inner.extraction,
                    policy: self.inner.domain_policy,
                },
            )
        };

        log_outcome(&record, &result);
        Some(record)
    }
}

fn log_outcome(record: &CrawlRecord, result: &std::result::Result<FetchedPage, FetchError>) {
    match (record.outcome, result) {
        (Outcome::Error, Err(e)) => {
            warn!(url = %record.url, error = %e, "Error when attempting to work on URL");
        }
        (Outcome::Warn, _) => {
            debug!(url = %record.url, status = record.status, "responded with non-2XX status");
        }
        (Outcome::Ok, Ok(page)) if !page.is_text() => {
            debug!(url = %record.url, status = record.status, "responded with 2XX but isn't readable");
        }
        _ => {
            debug!(
                url = %record.url,
                status = record.status,
                found = ?record.links_to_follow(),
                "responded with 2XX, scanned for URLs"
            );
        }
    }
}

// Works out (hostname, root URL) from the configured domain.
//
//   "example.com"                 -> ("example.com", "http://example.com")
//   "https://example.com/docs"    -> ("example.com", "http://example.com")
//   "127.0.0.1:8080"              -> ("127.0.0.1", "http://127.0.0.1:8080")
fn parse_root(raw: &str) -> Result<(String, String)> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| SpiderError::InvalidDomain(raw.to_string(), reason.to_string());

    if trimmed.is_empty() {
        return Err(invalid("domain is empty"));
    }

    // "localhost:8080" parses as a URL with scheme "localhost", so only take
    // the first parse if it actually found a host
    let parsed = Url::parse(trimmed)
        .ok()
        .filter(|url| url.host_str().is_some())
        .or_else(|| Url::parse(&format!("http://{}", trimmed)).ok())
        .ok_or_else(|| invalid("not a hostname or URL"))?;

    let host = parsed.host_str().ok_or_else(|| invalid("URL has no host"))?;

    let root_url = match parsed.port() {
        Some(port) => format!("http://{}:{}", host, port),
        None => format!("http://{}", host),
    };

    Ok((host.to_string(), root_url))
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why does crawl() spawn instead of being an async fn?
//    - An async fn that awaits itself needs boxing to have a finite size
//    - Spawning also gives the fire-and-forget behaviour we want: the parent
//      page's task ends without waiting for its children
//
// 2. Why a watch channel for the in-flight count?
//    - main needs to await "count reached zero" alongside Ctrl+C
//    - watch::Receiver::wait_for checks the current value first, so there is
//      no missed-wakeup window
//
// 3. Why clone the whole Spider into each task?
//    - tokio::spawn needs a 'static future
//    - Spider is just an Arc, so the clone is a reference count bump
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::HttpFetcher;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // In-memory site. Unknown URLs fail like an unreachable host.
    // The gate holds every fetch until it is opened, except the URLs in
    // `let_through`.
    struct StubFetcher {
        pages: HashMap<String, FetchedPage>,
        gate: watch::Receiver<bool>,
        let_through: HashSet<String>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(pages: Vec<(&str, u16, Option<&str>, &str)>) -> (Self, watch::Sender<bool>) {
            let (gate_tx, gate) = watch::channel(true);
            let pages = pages
                .into_iter()
                .map(|(url, status, content_type, body)| {
                    (
                        url.to_string(),
                        FetchedPage {
                            status,
                            content_type: content_type.map(str::to_string),
                            body: body.to_string(),
                        },
                    )
                })
                .collect();
            let fetcher = Self {
                pages,
                gate,
                let_through: HashSet::new(),
                calls: std::sync::Mutex::new(Vec::new()),
            };
            (fetcher, gate_tx)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Fetcher for StubFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, std::result::Result<FetchedPage, FetchError>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(url.to_string());
                if !self.let_through.contains(url) {
                    let mut gate = self.gate.clone();
                    let _ = gate.wait_for(|open| *open).await;
                }
                self.pages
                    .get(url)
                    .cloned()
                    .ok_or_else(|| FetchError::Connect("unknown host".to_string()))
            })
        }
    }

    fn small_site() -> Vec<(&'static str, u16, Option<&'static str>, &'static str)> {
        vec![
            (
                "http://example.com",
                200,
                Some("text/html"),
                r#"<a href="http://example.com/a">A</a>
                   <a href="http://example.com/b">B</a>
                   <a href="http://other.com/x">X</a>
                   <a href="https://sub.example.com/y">Y</a>"#,
            ),
            (
                "http://example.com/a",
                200,
                Some("text/html; charset=utf-8"),
                r#"<a href="http://example.com">Home</a> <a href="http://example.com/missing">?</a>"#,
            ),
            ("http://example.com/b", 200, Some("application/pdf"), ""),
            ("http://example.com/missing", 404, Some("text/html"), "not found"),
        ]
    }

    async fn run_to_idle(spider: &Spider) {
        tokio::time::timeout(Duration::from_secs(5), spider.wait_idle())
            .await
            .expect("crawl did not finish");
    }

    #[tokio::test]
    async fn test_crawls_whole_site() {
        let (fetcher, _gate) = StubFetcher::new(small_site());
        let fetcher = Arc::new(fetcher);
        let spider = Spider::new(SpiderSettings::new("example.com"), fetcher.clone()).unwrap();

        spider.start().unwrap();
        run_to_idle(&spider).await;

        let (path, report) = spider.snapshot().await;
        assert_eq!(path.len(), 4);
        assert_eq!(report.len(), path.len());

        let root = &path[0];
        assert_eq!(root.url, "http://example.com");
        assert_eq!(root.outcome, Outcome::Ok);
        assert_eq!(
            root.next_links,
            Some(vec!["http://example.com/a".to_string(), "http://example.com/b".to_string()])
        );

        let mut ok = report.ok.clone();
        ok.sort();
        assert_eq!(ok, vec!["http://example.com", "http://example.com/a", "http://example.com/b"]);
        assert_eq!(report.warn, vec!["http://example.com/missing"]);
        assert!(report.error.is_empty());

        let pdf = path.iter().find(|r| r.url == "http://example.com/b").unwrap();
        assert_eq!(pdf.next_links, Some(vec![]));

        // The back-link to the root was already visited
        let mut calls = fetcher.calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                "http://example.com",
                "http://example.com/a",
                "http://example.com/b",
                "http://example.com/missing",
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_root_is_error() {
        let (fetcher, _gate) = StubFetcher::new(vec![]);
        let spider = Spider::new(SpiderSettings::new("example.com"), Arc::new(fetcher)).unwrap();

        spider.start().unwrap();
        run_to_idle(&spider).await;

        let path = spider.crawl_path().await;
        assert_eq!(path, vec![CrawlRecord::error("http://example.com")]);
        assert_eq!(spider.report().await.error, vec!["http://example.com"]);
    }

    #[tokio::test]
    async fn test_stop_before_fetch_resolves() {
        let (fetcher, gate) = StubFetcher::new(small_site());
        gate.send_replace(false);
        let fetcher = Arc::new(fetcher);
        let spider = Spider::new(SpiderSettings::new("example.com"), fetcher.clone()).unwrap();

        spider.start().unwrap();
        tokio::task::yield_now().await;
        spider.stop();
        assert!(!spider.is_running());
        assert!(!spider.is_idle());

        gate.send_replace(true);
        run_to_idle(&spider).await;

        // The root fetch was already issued so it still gets recorded,
        // but none of its links are crawled
        let path = spider.crawl_path().await;
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].url, "http://example.com");
        assert_eq!(path[0].links_to_follow().len(), 2);
        assert_eq!(fetcher.calls(), vec!["http://example.com"]);
    }

    #[tokio::test]
    async fn test_stop_drops_crawls_waiting_for_a_slot() {
        let (mut fetcher, gate) = StubFetcher::new(vec![
            (
                "http://example.com",
                200,
                Some("text/html"),
                "http://example.com/a http://example.com/b http://example.com/c",
            ),
            ("http://example.com/a", 200, Some("text/plain"), ""),
            ("http://example.com/b", 200, Some("text/plain"), ""),
            ("http://example.com/c", 200, Some("text/plain"), ""),
        ]);
        fetcher.let_through.insert("http://example.com".to_string());
        gate.send_replace(false);
        let fetcher = Arc::new(fetcher);

        let mut settings = SpiderSettings::new("example.com");
        settings.max_concurrency = 1;
        let spider = Spider::new(settings, fetcher.clone()).unwrap();

        spider.start().unwrap();

        // Wait until /a holds the only slot and /b, /c are queued behind it
        for _ in 0..100 {
            if fetcher.calls().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(fetcher.calls(), vec!["http://example.com", "http://example.com/a"]);

        spider.stop();
        gate.send_replace(true);
        run_to_idle(&spider).await;

        // /a was on the wire and still gets recorded; /b and /c never go out
        assert_eq!(fetcher.calls(), vec!["http://example.com", "http://example.com/a"]);
        let (path, report) = spider.snapshot().await;
        let urls: Vec<&str> = path.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://example.com", "http://example.com/a"]);
        assert_eq!(report.ok.len(), path.len());
    }

    #[tokio::test]
    async fn test_start_twice_is_refused() {
        let (fetcher, _gate) = StubFetcher::new(vec![]);
        let spider = Spider::new(SpiderSettings::new("example.com"), Arc::new(fetcher)).unwrap();

        spider.start().unwrap();
        assert!(matches!(spider.start(), Err(SpiderError::InvalidState(_))));

        spider.stop();
        assert!(matches!(spider.start(), Err(SpiderError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_nothing_happens_before_start() {
        let (fetcher, _gate) = StubFetcher::new(small_site());
        let fetcher = Arc::new(fetcher);
        let spider = Spider::new(SpiderSettings::new("example.com"), fetcher.clone()).unwrap();

        assert!(!spider.is_running());
        assert!(spider.is_idle());
        spider.wait_idle().await;
        assert!(spider.crawl_path().await.is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_cap_of_one_still_finishes() {
        let (fetcher, _gate) = StubFetcher::new(small_site());
        let mut settings = SpiderSettings::new("example.com");
        settings.max_concurrency = 1;
        let spider = Spider::new(settings, Arc::new(fetcher)).unwrap();

        spider.start().unwrap();
        run_to_idle(&spider).await;

        assert_eq!(spider.crawl_path().await.len(), 4);
    }

    #[tokio::test]
    async fn test_crawl_against_http_server() {
        let server = MockServer::start().await;
        let uri = server.uri();

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(format!(
                        r#"<a href="{uri}/a">a</a> <a href="{uri}/gone">gone</a> <a href="http://other.com/">x</a>"#
                    )),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/plain"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let spider = Spider::new(SpiderSettings::new(uri.clone()), Arc::new(fetcher)).unwrap();
        assert_eq!(spider.root_url(), uri);

        spider.start().unwrap();
        run_to_idle(&spider).await;

        let report = spider.report().await;
        assert_eq!(report.ok.len(), 2);
        assert!(report.ok.contains(&format!("{uri}/a")));
        assert_eq!(report.warn, vec![format!("{uri}/gone")]);
        assert!(report.error.is_empty());
    }

    #[test]
    fn test_parse_root() {
        assert_eq!(
            parse_root("example.com").unwrap(),
            ("example.com".to_string(), "http://example.com".to_string())
        );
        assert_eq!(
            parse_root("https://example.com/docs?x=1").unwrap(),
            ("example.com".to_string(), "http://example.com".to_string())
        );
        assert_eq!(
            parse_root("127.0.0.1:8080").unwrap(),
            ("127.0.0.1".to_string(), "http://127.0.0.1:8080".to_string())
        );
        assert_eq!(
            parse_root("localhost:3000").unwrap(),
            ("localhost".to_string(), "http://localhost:3000".to_string())
        );
    }

    #[test]
    fn test_parse_root_rejects_empty() {
        assert!(matches!(parse_root(""), Err(SpiderError::InvalidDomain(..))));
        assert!(matches!(parse_root("  "), Err(SpiderError::InvalidDomain(..))));
    }

    #[test]
    fn test_url_matches_domain_policy() {
        let (fetcher, _gate) = StubFetcher::new(vec![]);
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

        let closed = Spider::new(SpiderSettings::new("example.com"), fetcher.clone()).unwrap();
        assert!(closed.url_matches_domain("https://example.com/x"));
        assert!(!closed.url_matches_domain("https://www.example.com/x"));
        assert!(!closed.url_matches_domain("not a url"));

        let mut settings = SpiderSettings::new("example.com");
        settings.domain_policy = DomainMatchPolicy::FailOpen;
        let open = Spider::new(settings, fetcher).unwrap();
        assert!(open.url_matches_domain("not a url"));
        assert!(!open.url_matches_domain("https://other.com/x"));
    }
}
