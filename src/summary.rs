use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::collector::{CollectReport, StopReason};
use crate::export::ExportOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct ExportStatus {
    pub format: String,
    pub path: PathBuf,
    pub error: Option<String>,
}

impl From<&ExportOutcome> for ExportStatus {
    fn from(outcome: &ExportOutcome) -> Self {
        Self {
            format: outcome.format.to_string(),
            path: outcome.path.clone(),
            error: outcome.result.as_ref().err().map(ToString::to_string),
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub category: String,
    pub requested: usize,
    pub collected: usize,
    pub iterations: u32,
    pub stop_reason: StopReason,
    pub navigation_error: Option<String>,
    pub exports: Vec<ExportStatus>,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Local>,
        category: &str,
        requested: usize,
        report: &CollectReport,
        exports: &[ExportOutcome],
    ) -> Self {
        Self {
            started_at,
            finished_at: Local::now(),
            category: category.to_string(),
            requested,
            collected: report.records.len(),
            iterations: report.iterations,
            stop_reason: report.stop_reason,
            navigation_error: None,
            exports: exports.iter().map(ExportStatus::from).collect(),
        }
    }

    pub fn exports_failed(&self) -> bool {
        self.exports.iter().any(|e| e.error.is_some())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "Collected {} of {} products from '{}' in {} scrolls ({}, {}s)",
            self.collected,
            self.requested,
            self.category,
            self.iterations,
            self.stop_reason,
            elapsed.num_seconds()
        )?;
        if let Some(err) = &self.navigation_error {
            writeln!(f, "  navigation: {err}")?;
        }
        for export in &self.exports {
            match &export.error {
                None => writeln!(f, "  {}: {}", export.format, export.path.display())?,
                Some(err) => writeln!(f, "  {}: FAILED ({err})", export.format)?,
            }
        }
        Ok(())
    }
}
