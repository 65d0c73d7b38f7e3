use anyhow::{Context, bail};
use clap::Parser;
use tracing::error;

use zepto_scraper::{ScrapeConfig, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ScrapeConfig::parse();
    logging::init(&config.log_level);

    let summary = zepto_scraper::run(&config)
        .await
        .inspect_err(|e| error!("{e}"))
        .context("scrape failed")?;

    println!("{summary}");
    if summary.exports_failed() {
        bail!("one or more exports failed");
    }
    Ok(())
}
