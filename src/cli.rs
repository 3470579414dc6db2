// src/cli.rs
// =============================================================================
// This file defines the configuration of the spider using the `clap` crate.
//
// Every option can come from a flag or from the environment (and, through
// dotenvy in main.rs, from a .env file), so the usual way to run it is:
//
//   DOMAIN=example.com site-spider --verbose
//
// The derive API turns the struct below into the parser; `env = "..."` names
// the variable each flag falls back to.
// =============================================================================

use crate::checker::{DomainMatchPolicy, LinkExtraction};
use crate::spider::{SpiderSettings, DEFAULT_MAX_CONCURRENCY};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "site-spider",
    version,
    about = "Crawls every page of a single domain and reports which ones are OK, WARN or ERROR",
    long_about = "site-spider starts from the root of a domain and follows every in-domain link it finds. \
                  Press Ctrl+C to stop: the crawl path and a summary report are written to the output directory."
)]
pub struct Cli {
    /// Domain to crawl, either a hostname (example.com) or a URL
    ///
    /// Only the host (and port, if any) is kept; crawling starts at http://<host>
    #[arg(long, env = "DOMAIN")]
    pub domain: String,

    /// Log every step of the crawl
    #[arg(short, long, env = "VERBOSE")]
    pub verbose: bool,

    /// Directory the crawl path and report are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// How links are found in page bodies
    #[arg(long, env = "LINK_EXTRACTION", value_enum, default_value_t = LinkExtraction::Regex)]
    pub extraction: LinkExtraction,

    /// Treat discovered links that don't parse as URLs as in-domain
    #[arg(long, env = "FAIL_OPEN")]
    pub fail_open: bool,

    /// Maximum number of requests in flight at once
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}

impl Cli {
    pub fn spider_settings(&self) -> SpiderSettings {
        SpiderSettings {
            domain: self.domain.clone(),
            extraction: self.extraction,
            domain_policy: if self.fail_open {
                DomainMatchPolicy::FailOpen
            } else {
                DomainMatchPolicy::FailClosed
            },
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
