use std::path::PathBuf;
use std::time::Duration;

/// Errors that surface out of a scrape run.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Automation server at {url} is not reachable: {reason}")]
    ServerUnreachable { url: String, reason: String },

    #[error("Failed to establish driver session: {0}")]
    Session(String),

    #[error("Timed out after {waited:?} waiting for {target}")]
    NavigationTimeout { target: String, waited: Duration },

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// Per-element and per-iteration failures. The collector contains these.
#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("Could not list visible products: {0}")]
    Query(String),

    #[error("Could not read product description: {0}")]
    Extraction(String),

    #[error("Could not capture {path}: {reason}")]
    Capture { path: PathBuf, reason: String },

    #[error("Scroll gesture failed: {0}")]
    Gesture(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;
