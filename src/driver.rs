use std::path::Path;
use std::time::Duration;

use image::ImageFormat;
use serde_json::{Value, json};
use thirtyfour::prelude::*;
use thirtyfour::Capabilities;
use tracing::{debug, info, warn};

use crate::collector::ListingSource;
use crate::config::ScrapeConfig;
use crate::error::{ElementError, ScrapeError};
use crate::navigator::Navigator;

/// Length of the fallback pointer drag. Shorter drags fling the list.
pub const FALLBACK_SWIPE_DURATION: Duration = Duration::from_millis(800);

/// A live automation session the pipeline can navigate, scrape and release.
#[allow(async_fn_in_trait)]
pub trait DriverSession: ListingSource {
    async fn navigate_to_category(&mut self, config: &ScrapeConfig) -> Result<(), ScrapeError>;

    /// Tear the session down. Failures are logged, not returned.
    async fn quit(self);
}

/// Window size in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Start and end points of the fallback swipe: bottom 80% to top 30%,
    /// horizontally centred.
    pub fn fallback_swipe(&self) -> ((i64, i64), (i64, i64)) {
        let x = (self.width / 2.0) as i64;
        let start_y = (self.height * 0.8) as i64;
        let end_y = (self.height * 0.3) as i64;
        ((x, start_y), (x, end_y))
    }

    /// Region handed to `mobile: swipe`.
    pub fn swipe_area(&self) -> Value {
        json!({
            "left": (self.width * 0.1) as i64,
            "top": (self.height * 0.3) as i64,
            "width": (self.width * 0.8) as i64,
            "height": (self.height * 0.5) as i64,
        })
    }
}

pub fn product_card_xpath(app_package: &str) -> String {
    format!("//android.widget.Button[@resource-id='{app_package}:id/product-card-container']")
}

/// W3C capabilities for a UiAutomator2 session against the configured app.
pub fn capabilities(config: &ScrapeConfig) -> Capabilities {
    let mut caps = Capabilities::new();
    caps.insert("platformName".into(), json!("Android"));
    caps.insert("appium:automationName".into(), json!("UiAutomator2"));
    caps.insert("appium:deviceName".into(), json!("Android"));
    caps.insert("appium:udid".into(), json!(config.udid));
    caps.insert("appium:appPackage".into(), json!(config.app_package));
    caps.insert("appium:appActivity".into(), json!(config.app_activity));
    caps.insert("appium:noReset".into(), json!(config.no_reset));
    caps.insert(
        "appium:uiautomator2ServerInstallTimeout".into(),
        json!(config.server_install_timeout_ms),
    );
    caps
}

/// Interpret the body of `GET /status`.
pub fn check_status(body: &str) -> Result<(), String> {
    let status: Value = serde_json::from_str(body).map_err(|e| format!("bad status body: {e}"))?;
    match status.pointer("/value/ready").and_then(Value::as_bool) {
        Some(false) => {
            let message = status
                .pointer("/value/message")
                .and_then(Value::as_str)
                .unwrap_or("server not ready");
            Err(message.to_string())
        }
        // Appium 1.x omits `ready`; any parseable answer means it is up.
        _ => Ok(()),
    }
}

pub async fn preflight(server: &str) -> Result<(), ScrapeError> {
    let url = format!("{}/status", server.trim_end_matches('/'));
    let unreachable = |reason: String| ScrapeError::ServerUnreachable {
        url: url.clone(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| unreachable(e.to_string()))?;
    let body = client
        .get(&url)
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?
        .text()
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    check_status(&body).map_err(unreachable)
}

/// An Appium session driving the shopping app. Owns the underlying
/// `WebDriver`; call [`DriverSession::quit`] to release it.
pub struct AppiumSession {
    driver: WebDriver,
    product_card: String,
    viewport: Option<Viewport>,
}

impl AppiumSession {
    pub async fn connect(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        preflight(&config.server).await?;

        info!(udid = %config.udid, server = %config.server, "starting driver session");
        let driver = WebDriver::new(config.server.as_str(), capabilities(config))
            .await
            .map_err(|e| ScrapeError::Session(e.to_string()))?;
        info!("driver session started");

        Ok(Self {
            driver,
            product_card: product_card_xpath(&config.app_package),
            viewport: None,
        })
    }

    async fn viewport(&mut self) -> Result<Viewport, ElementError> {
        if let Some(viewport) = self.viewport {
            return Ok(viewport);
        }
        let rect = self
            .driver
            .get_window_rect()
            .await
            .map_err(|e| ElementError::Gesture(format!("window size unavailable: {e}")))?;
        let viewport = Viewport {
            width: rect.width as f64,
            height: rect.height as f64,
        };
        debug!(?viewport, "window size");
        self.viewport = Some(viewport);
        Ok(viewport)
    }
}

impl DriverSession for AppiumSession {
    async fn navigate_to_category(&mut self, config: &ScrapeConfig) -> Result<(), ScrapeError> {
        Navigator::new(&self.driver, &config.app_package, config.navigation_timings())
            .navigate_to_category(&config.category)
            .await
    }

    async fn quit(self) {
        match self.driver.quit().await {
            Ok(()) => info!("driver session closed"),
            Err(e) => warn!("failed to close driver session: {e}"),
        }
    }
}

impl ListingSource for AppiumSession {
    type Element = WebElement;

    async fn visible_elements(&mut self) -> Result<Vec<WebElement>, ElementError> {
        self.driver
            .find_all(By::XPath(self.product_card.clone()))
            .await
            .map_err(|e| ElementError::Query(e.to_string()))
    }

    async fn description(&mut self, element: &WebElement) -> Result<Option<String>, ElementError> {
        element
            .attr("content-desc")
            .await
            .map_err(|e| ElementError::Extraction(e.to_string()))
    }

    async fn capture(&mut self, element: &WebElement, path: &Path) -> Result<(), ElementError> {
        let failed = |reason: String| ElementError::Capture {
            path: path.to_path_buf(),
            reason,
        };
        let png = element
            .screenshot_as_png()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| failed(format!("invalid PNG from driver: {e}")))?;
        img.save_with_format(path, ImageFormat::Png)
            .map_err(|e| failed(e.to_string()))
    }

    async fn swipe_up(&mut self) -> Result<(), ElementError> {
        let mut args = self.viewport().await?.swipe_area();
        args["direction"] = json!("up");
        args["percent"] = json!(0.75);
        self.driver
            .execute("mobile: swipe", vec![args])
            .await
            .map(|_| ())
            .map_err(|e| ElementError::Gesture(e.to_string()))
    }

    async fn swipe_by_coordinates(&mut self) -> Result<(), ElementError> {
        let ((x, start_y), (_, end_y)) = self.viewport().await?.fallback_swipe();
        self.driver
            .action_chain_with_delay(None, Some(FALLBACK_SWIPE_DURATION))
            .move_to(x, start_y)
            .click_and_hold()
            .move_to(x, end_y)
            .release()
            .perform()
            .await
            .map_err(|e| ElementError::Gesture(e.to_string()))
    }
}
