//! Scrapes product listings from the Zepto Android app through an Appium
//! server: opens a category, scrolls the listing, parses each product card's
//! content description and exports the rows.

pub mod collector;
pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod logging;
pub mod navigator;
pub mod product;
pub mod summary;

use std::fs;

use chrono::Local;
use tracing::{info, warn};

pub use collector::{CollectReport, Collector, CollectorOptions, ListingSource, StopReason};
pub use config::{ExportFormat, ScrapeConfig};
pub use driver::{AppiumSession, DriverSession};
pub use error::{ElementError, ExportError, ScrapeError};
pub use export::{export, export_all};
pub use navigator::{NavigationTimings, Navigator};
pub use product::{ProductRecord, parse_description, parse_mrp, parse_name_weight, parse_price};
pub use summary::RunSummary;

/// Outcome of driving one session: the collection and any navigation error
/// that was tolerated.
pub type Scraped = (CollectReport, Option<String>);

/// Run one scrape end to end against a fresh Appium session.
pub async fn run(config: &ScrapeConfig) -> Result<RunSummary, ScrapeError> {
    config.validate()?;
    let started_at = Local::now();

    let images = config.images_path();
    fs::create_dir_all(&images).map_err(|source| ExportError::Io {
        path: images.clone(),
        source,
    })?;

    let session = AppiumSession::connect(config).await?;
    let (report, navigation_error) = scrape_and_release(session, config).await?;

    let outcomes = export_all(&report.records, &config.unique_formats(), |format| {
        config.export_path(format)
    });

    let mut summary = RunSummary::new(
        started_at,
        &config.category,
        config.max_products,
        &report,
        &outcomes,
    );
    summary.navigation_error = navigation_error;
    info!(
        collected = summary.collected,
        stop_reason = %summary.stop_reason,
        "done"
    );
    Ok(summary)
}

/// Navigate and collect, then release the session whatever happened.
pub async fn scrape_and_release<S: DriverSession>(
    mut session: S,
    config: &ScrapeConfig,
) -> Result<Scraped, ScrapeError> {
    let scraped = scrape(&mut session, config).await;
    session.quit().await;
    scraped
}

async fn scrape<S: DriverSession>(
    session: &mut S,
    config: &ScrapeConfig,
) -> Result<Scraped, ScrapeError> {
    let navigation_error = match session.navigate_to_category(config).await {
        Ok(()) => None,
        Err(e) if config.strict_navigation => return Err(e),
        Err(e) => {
            warn!("{e}; collecting from the current screen");
            Some(e.to_string())
        }
    };

    let report = Collector::new(config.collector_options())
        .collect(session)
        .await;
    Ok((report, navigation_error))
}
