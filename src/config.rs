use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::collector::CollectorOptions;
use crate::error::ScrapeError;
use crate::navigator::NavigationTimings;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:4723";
pub const DEFAULT_APP_PACKAGE: &str = "com.zeptoconsumerapp";
pub const DEFAULT_APP_ACTIVITY: &str = "com.zeptoconsumerapp.MainActivity";
pub const DEFAULT_CATEGORY: &str = "Fruits & Vegetables";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Scrape a product category from the Zepto Android app over Appium.
#[derive(Debug, Clone, Parser)]
#[command(name = "zepto-scraper", version, about)]
pub struct ScrapeConfig {
    /// Device identifier (adb serial) to drive.
    #[arg(long, env = "ZEPTO_UDID")]
    pub udid: String,

    /// Category button to open, matched on its content description.
    #[arg(long, env = "ZEPTO_CATEGORY", default_value = DEFAULT_CATEGORY)]
    pub category: String,

    /// Stop after this many products.
    #[arg(long, env = "ZEPTO_MAX_PRODUCTS", default_value_t = 10)]
    pub max_products: usize,

    /// Appium server address.
    #[arg(long, env = "ZEPTO_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    #[arg(long, default_value = DEFAULT_APP_PACKAGE)]
    pub app_package: String,

    #[arg(long, default_value = DEFAULT_APP_ACTIVITY)]
    pub app_activity: String,

    /// Keep app data and login between runs.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub no_reset: bool,

    #[arg(long, default_value_t = 60_000)]
    pub server_install_timeout_ms: u64,

    #[arg(long, env = "ZEPTO_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Screenshot directory, relative to the output directory.
    #[arg(long, default_value = "product_images")]
    pub images_dir: PathBuf,

    /// File name (without extension) of the exports.
    #[arg(long, default_value = "zepto_products")]
    pub basename: String,

    /// Export formats; repeat for several.
    #[arg(long = "format", value_enum, default_values_t = [ExportFormat::Xlsx, ExportFormat::Csv])]
    pub formats: Vec<ExportFormat>,

    /// Name screenshots `<n>.png` instead of `<n>_<name>.png`.
    #[arg(long)]
    pub no_sanitized_names: bool,

    /// Seconds to wait for a navigation element to become clickable.
    #[arg(long, default_value_t = 15)]
    pub wait_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub launch_delay_secs: u64,

    #[arg(long, default_value_t = 2)]
    pub tap_delay_secs: u64,

    /// Pause after each scroll, in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    pub settle_ms: u64,

    /// Consecutive scrolls without new products before giving up.
    #[arg(long, default_value_t = 3)]
    pub stagnation_limit: u32,

    /// Abort when category navigation times out instead of scraping whatever is on screen.
    #[arg(long)]
    pub strict_navigation: bool,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.udid.trim().is_empty() {
            return Err(ScrapeError::Config("device udid must not be empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(ScrapeError::Config("category must not be empty".into()));
        }
        if self.max_products == 0 {
            return Err(ScrapeError::Config("max products must be at least 1".into()));
        }
        if self.stagnation_limit == 0 {
            return Err(ScrapeError::Config("stagnation limit must be at least 1".into()));
        }
        if !(self.server.starts_with("http://") || self.server.starts_with("https://")) {
            return Err(ScrapeError::Config(format!(
                "server must be an http(s) URL, got {}",
                self.server
            )));
        }
        if self.formats.is_empty() {
            return Err(ScrapeError::Config("at least one export format is required".into()));
        }
        if self.basename.is_empty() || self.basename.contains(['/', '\\']) {
            return Err(ScrapeError::Config(format!("invalid basename {:?}", self.basename)));
        }
        Ok(())
    }

    pub fn images_path(&self) -> PathBuf {
        self.output_dir.join(&self.images_dir)
    }

    pub fn export_path(&self, format: ExportFormat) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.basename, format.extension()))
    }

    /// Formats in the order given, without repeats.
    pub fn unique_formats(&self) -> Vec<ExportFormat> {
        let mut out = Vec::with_capacity(self.formats.len());
        for f in &self.formats {
            if !out.contains(f) {
                out.push(*f);
            }
        }
        out
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn launch_delay(&self) -> Duration {
        Duration::from_secs(self.launch_delay_secs)
    }

    pub fn tap_delay(&self) -> Duration {
        Duration::from_secs(self.tap_delay_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn navigation_timings(&self) -> NavigationTimings {
        NavigationTimings {
            wait: self.wait(),
            launch_delay: self.launch_delay(),
            tap_delay: self.tap_delay(),
        }
    }

    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            target_count: self.max_products,
            stagnation_limit: self.stagnation_limit,
            settle: self.settle(),
            images_dir: self.images_path(),
            sanitized_names: !self.no_sanitized_names,
        }
    }
}
