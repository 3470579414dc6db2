// src/main.rs
// =============================================================================
// This is the entry point of the spider.
//
// What happens here:
// 1. Load .env, parse flags/environment using clap
// 2. Set up logging
// 3. Build the spider and start it
// 4. Wait for Ctrl+C (or for the crawl to run out of links)
// 5. Stop the spider, write the crawl path and report, exit
//
// Exit codes: 0 after a normal shutdown, 2 if something went wrong before or
// while writing the results.
// =============================================================================

mod checker; // src/checker/ - fetching and classifying a single URL
mod cli; // src/cli.rs - configuration
mod error; // src/error.rs - SpiderError
mod logging; // src/logging.rs - tracing setup
mod output; // src/output.rs - crawl path / report files
mod spider; // src/spider/ - the crawl driver

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            // Logging may not be up yet, so go straight to stderr
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<()> {
    // A missing .env file is fine, the environment may already be set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    let fetcher = checker::HttpFetcher::new(cli.request_timeout())
        .context("failed to build HTTP client")?;
    let spider = spider::Spider::new(cli.spider_settings(), Arc::new(fetcher))
        .context("failed to set up spider")?;

    info!(domain = spider.domain(), root = spider.root_url(), "Crawling");
    spider.start()?;

    // The crawl only ends on its own if every page has been visited
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, shutting down");
        }
        _ = spider.wait_idle() => {
            info!("No links left to crawl, shutting down");
        }
    }

    if !spider.is_idle() {
        info!("Abandoning fetches still in flight");
    }

    match output::dump(&spider, &cli.output_dir).await {
        Ok(paths) => {
            info!(
                crawl_path = %paths.crawl_path.display(),
                report = %paths.report.display(),
                "Saved crawl results"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to save crawl results");
            Err(e.into())
        }
    }
}
