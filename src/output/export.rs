//! CSV and JSON export of analysis records

use crate::model::AnalysisRecord;
use crate::ScoutError;
use csv::Writer;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Column headers of the CSV export
pub const CSV_HEADERS: [&str; 5] = ["URL", "Business Name", "Load Time", "WordPress", "Status"];

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
}

impl ExportFormat {
    /// File extension used when no output path is given
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(format!(
                "unknown export format '{}' (expected csv, json or md)",
                other
            )),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes records as CSV, one row per record in rank order
///
/// Fields are quoted as needed, so business names containing commas survive.
pub fn write_csv<W: Write>(records: &[AnalysisRecord], writer: W) -> Result<(), ScoutError> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(CSV_HEADERS)?;

    for record in records {
        let load_time = record.page_load_time.to_string();
        let word_press = record.is_word_press.to_string();
        wtr.write_record([
            record.url.as_str(),
            record.business_name.as_str(),
            load_time.as_str(),
            word_press.as_str(),
            record.status.as_str(),
        ])?;
    }

    wtr.flush()?;
    tracing::debug!(records = records.len(), "Exported records as CSV");
    Ok(())
}

/// Writes records as a pretty-printed JSON array with camelCase fields
pub fn write_json<W: Write>(records: &[AnalysisRecord], mut writer: W) -> Result<(), ScoutError> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    tracing::debug!(records = records.len(), "Exported records as JSON");
    Ok(())
}
