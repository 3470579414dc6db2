// src/output.rs
// =============================================================================
// Writes the spider's state to disk when the crawl ends.
//
// Two files per run, both stamped with the current time in milliseconds:
// - crawl-path_<millis>.json: every CrawlRecord, in completion order
// - report_<millis>.txt:      visited URLs grouped under OK / WARN / ERROR
// =============================================================================

use crate::error::Result;
use crate::spider::{CrawlRecord, Report, Spider};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the two output files of a run ended up
#[derive(Debug, Clone)]
pub struct DumpPaths {
    pub crawl_path: PathBuf,
    pub report: PathBuf,
}

/// Writes the crawl path as a JSON array to `dir/crawl-path_<millis>.json`
pub fn write_crawl_path(dir: &Path, records: &[CrawlRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("crawl-path_{}.json", timestamp_millis()));

    let json = serde_json::to_string(records)?;
    fs::write(&path, json)?;

    Ok(path)
}

/// Writes the plain-text report to `dir/report_<millis>.txt`
pub fn write_report(dir: &Path, report: &Report) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("report_{}.txt", timestamp_millis()));

    fs::write(&path, report.render())?;

    Ok(path)
}

/// Shutdown sequence: stop the spider, then write whatever it has recorded.
///
/// Fetches still in flight are not waited for; their results are lost.
pub async fn dump(spider: &Spider, dir: &Path) -> Result<DumpPaths> {
    spider.stop();

    let (records, report) = spider.snapshot().await;
    info!(
        pages = records.len(),
        ok = report.ok.len(),
        warn = report.warn.len(),
        error = report.error.len(),
        "writing crawl results"
    );

    let crawl_path = write_crawl_path(dir, &records)?;
    let report = write_report(dir, &report)?;

    Ok(DumpPaths { crawl_path, report })
}

fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
