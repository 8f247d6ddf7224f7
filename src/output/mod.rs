//! Output module for run statistics and exports
//!
//! This module handles:
//! - Reducing a run's records to summary statistics
//! - Printing statistics to the terminal
//! - Exporting runs as CSV, JSON or a markdown report

mod export;
mod markdown;
pub mod stats;

pub use export::{write_csv, write_json, ExportFormat, CSV_HEADERS};
pub use markdown::{format_markdown_report, write_markdown};
pub use stats::{print_statistics, reduce_stats, AnalysisStats};

use crate::model::Run;
use crate::ScoutError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes `run` to `writer` in `format`
pub fn export_run<W: Write>(run: &Run, format: ExportFormat, writer: W) -> Result<(), ScoutError> {
    match format {
        ExportFormat::Csv => write_csv(&run.records, writer),
        ExportFormat::Json => write_json(&run.records, writer),
        ExportFormat::Markdown => write_markdown(run, writer),
    }
}

/// Writes `run` to the file at `path` in `format`
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the export
/// * `Err(ScoutError)` - Failed to create or write the file
pub fn export_run_to_file(run: &Run, format: ExportFormat, path: &Path) -> Result<(), ScoutError> {
    let mut writer = BufWriter::new(File::create(path)?);
    export_run(run, format, &mut writer)?;
    writer.flush()?;

    tracing::info!(path = %path.display(), format = %format, "Export written");
    Ok(())
}
