use std::time::Duration;

use thirtyfour::prelude::*;
use tokio::time::sleep;
use tracing::{error, info};

use crate::error::ScrapeError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct NavigationTimings {
    /// Bound on waiting for an element to become clickable.
    pub wait: Duration,
    /// Pause before the first tap while the app finishes launching.
    pub launch_delay: Duration,
    /// Pause around each tap.
    pub tap_delay: Duration,
}

/// Quote `value` as an XPath 1.0 string literal.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

pub fn category_tab_xpath(app_package: &str) -> String {
    format!(
        "(//android.view.ViewGroup[@resource-id='{app_package}:id/bottom-navigation-menu'])[2]/android.view.ViewGroup"
    )
}

pub fn category_button_xpath(category: &str) -> String {
    format!(
        "//android.widget.Button[@content-desc={}]",
        xpath_literal(category)
    )
}

/// Brings the app from its home screen to a category listing.
pub struct Navigator<'a> {
    driver: &'a WebDriver,
    app_package: &'a str,
    timings: NavigationTimings,
}

impl<'a> Navigator<'a> {
    pub fn new(driver: &'a WebDriver, app_package: &'a str, timings: NavigationTimings) -> Self {
        Self {
            driver,
            app_package,
            timings,
        }
    }

    pub async fn open_category_tab(&self) -> Result<(), ScrapeError> {
        sleep(self.timings.launch_delay).await;
        self.tap(category_tab_xpath(self.app_package), "category tab")
            .await?;
        info!("category tab opened");
        Ok(())
    }

    pub async fn open_category_by_name(&self, category: &str) -> Result<(), ScrapeError> {
        sleep(self.timings.tap_delay).await;
        self.tap(category_button_xpath(category), &format!("category '{category}'"))
            .await?;
        info!(%category, "category opened");
        Ok(())
    }

    pub async fn navigate_to_category(&self, category: &str) -> Result<(), ScrapeError> {
        self.open_category_tab().await?;
        self.open_category_by_name(category).await
    }

    async fn tap(&self, xpath: String, target: &str) -> Result<(), ScrapeError> {
        let timeout = || ScrapeError::NavigationTimeout {
            target: target.to_string(),
            waited: self.timings.wait,
        };

        let element = self
            .driver
            .query(By::XPath(xpath))
            .wait(self.timings.wait, POLL_INTERVAL)
            .and_clickable()
            .first()
            .await
            .map_err(|e| {
                error!("failed to find {target}: {e}");
                timeout()
            })?;
        element.click().await.map_err(|e| {
            error!("failed to tap {target}: {e}");
            timeout()
        })?;

        sleep(self.timings.tap_delay).await;
        Ok(())
    }
}
