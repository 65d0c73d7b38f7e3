use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};
use tracing::{error, info};

use crate::config::ExportFormat;
use crate::error::ExportError;
use crate::product::{COLUMNS, ProductRecord};

/// Result of writing one export file.
#[derive(Debug)]
pub struct ExportOutcome {
    pub format: ExportFormat,
    pub path: PathBuf,
    pub result: Result<(), ExportError>,
}

/// Write `records` to `destination`, replacing any existing file.
pub fn export(
    records: &[ProductRecord],
    destination: &Path,
    format: ExportFormat,
) -> Result<(), ExportError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    match format {
        ExportFormat::Xlsx => write_xlsx(records, destination),
        ExportFormat::Csv => write_csv(records, destination),
        ExportFormat::Json => write_json(records, destination),
    }
}

/// Export every format; one failing does not stop the others.
pub fn export_all<F>(records: &[ProductRecord], formats: &[ExportFormat], path_for: F) -> Vec<ExportOutcome>
where
    F: Fn(ExportFormat) -> PathBuf,
{
    formats
        .iter()
        .map(|&format| {
            let path = path_for(format);
            let result = export(records, &path, format);
            match &result {
                Ok(()) => info!(
                    "saved {} products to {}",
                    records.len(),
                    path.display()
                ),
                Err(e) => error!("failed to write {}: {e}", path.display()),
            }
            ExportOutcome {
                format,
                path,
                result,
            }
        })
        .collect()
}

fn write_xlsx(records: &[ProductRecord], destination: &Path) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (col, header) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (row, record) in records.iter().enumerate() {
        for (col, cell) in record.to_row().iter().enumerate() {
            sheet.write_string(row as u32 + 1, col as u16, *cell)?;
        }
    }

    workbook.save(destination)?;
    Ok(())
}

fn write_csv(records: &[ProductRecord], destination: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(destination)?;
    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.write_record(record.to_row())?;
    }
    wtr.flush().map_err(|source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    })
}

fn write_json(records: &[ProductRecord], destination: &Path) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    };
    let file = File::create(destination).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)
}
