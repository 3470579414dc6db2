// src/spider/record.rs
// =============================================================================
// The data the spider accumulates while it crawls.
//
// - Outcome: the three ways a fetch can end (OK, WARN, ERROR)
// - CrawlRecord: one entry per fetch attempt, in completion order
// - Report: the same URLs bucketed by outcome
//
// The JSON shape of CrawlRecord is what ends up in the crawl-path file:
//   {"url": "...", "result": "OK", "status": 200, "next": [...]}
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// 2xx response
    Ok,
    /// Any other HTTP status
    Warn,
    /// The request never produced a response
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Ok => "OK",
            Outcome::Warn => "WARN",
            Outcome::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One fetch attempt and what came out of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// The exact URL that was fetched
    pub url: String,
    #[serde(rename = "result")]
    pub outcome: Outcome,
    /// HTTP status code, 0 when the fetch failed outright
    pub status: u16,
    /// In-domain links discovered on the page. Only present for OK pages,
    /// and empty when the page was not a text document.
    #[serde(rename = "next", default, skip_serializing_if = "Option::is_none")]
    pub next_links: Option<Vec<String>>,
}

impl CrawlRecord {
    pub fn ok(url: impl Into<String>, status: u16, next_links: Vec<String>) -> Self {
        Self {
            url: url.into(),
            outcome: Outcome::Ok,
            status,
            next_links: Some(next_links),
        }
    }

    pub fn warn(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            outcome: Outcome::Warn,
            status,
            next_links: None,
        }
    }

    pub fn error(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: Outcome::Error,
            status: 0,
            next_links: None,
        }
    }

    /// Links to follow from this page, empty unless the outcome is OK
    pub fn links_to_follow(&self) -> &[String] {
        match (&self.outcome, &self.next_links) {
            (Outcome::Ok, Some(links)) => links,
            _ => &[],
        }
    }
}

/// Visited URLs bucketed by outcome.
///
/// A URL shows up once per fetch attempt, so it can appear more than once
/// if two branches of the crawl raced to fetch it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub ok: Vec<String>,
    pub warn: Vec<String>,
    pub error: Vec<String>,
}

impl Report {
    /// Appends the record's URL to the bucket for its outcome
    pub fn push(&mut self, record: &CrawlRecord) {
        let bucket = match record.outcome {
            Outcome::Ok => &mut self.ok,
            Outcome::Warn => &mut self.warn,
            Outcome::Error => &mut self.error,
        };
        bucket.push(record.url.clone());
    }

    pub fn len(&self) -> usize {
        self.ok.len() + self.warn.len() + self.error.len()
    }

    /// Plain-text summary written to the report file:
    ///
    /// ```text
    /// OK: <count>
    /// <urls>
    ///
    /// WARN: <count>
    /// <urls>
    ///
    /// ERROR: <count>
    /// <urls>
    /// ```
    pub fn render(&self) -> String {
        format!(
            "OK: {}\n{}\n\nWARN: {}\n{}\n\nERROR: {}\n{}",
            self.ok.len(),
            self.ok.join("\n"),
            self.warn.len(),
            self.warn.join("\n"),
            self.error.len(),
            self.error.join("\n"),
        )
    }
}
