//! Statistics over a finished run
//!
//! `reduce_stats` is a pure fold over the records; `print_statistics` renders
//! the result for the terminal.

use crate::model::{AnalysisRecord, Run};
use serde::Serialize;

/// Aggregate numbers for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total_sites: usize,

    /// Mean `page_load_time` over every record (0 when there are none)
    pub average_load_time: f64,

    pub wordpress_sites: usize,

    pub error_count: usize,
}

impl AnalysisStats {
    /// Share of records that ended in error, in [0, 1]
    pub fn failure_rate(&self) -> f64 {
        ratio(self.error_count, self.total_sites)
    }

    /// Share of records detected as WordPress, in [0, 1]
    pub fn wordpress_share(&self) -> f64 {
        ratio(self.wordpress_sites, self.total_sites)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Reduces a record collection to its summary numbers
///
/// Never fails; an empty collection yields all zeros.
pub fn reduce_stats(records: &[AnalysisRecord]) -> AnalysisStats {
    let total_sites = records.len();
    let total_load: f64 = records.iter().map(|r| r.page_load_time).sum();

    AnalysisStats {
        total_sites,
        average_load_time: if total_sites == 0 {
            0.0
        } else {
            total_load / total_sites as f64
        },
        wordpress_sites: records.iter().filter(|r| r.is_word_press).count(),
        error_count: records.iter().filter(|r| !r.is_success()).count(),
    }
}

/// Prints run statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `run` - The run the statistics were computed from
/// * `stats` - The statistics to display
pub fn print_statistics(run: &Run, stats: &AnalysisStats) {
    println!("=== Analysis Statistics ===\n");

    println!("Run:");
    println!("  Keyword: {}", run.keyword);
    println!("  Region: {}", run.region);
    println!("  Completed: {}", run.completed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(id) = run.saved_as {
        println!("  Saved as run #{}", id);
    }
    println!();

    println!("Overview:");
    println!("  Total sites analyzed: {}", stats.total_sites);
    println!("  Average load time: {:.2}s", stats.average_load_time);
    println!(
        "  WordPress sites: {} ({:.1}%)",
        stats.wordpress_sites,
        stats.wordpress_share() * 100.0
    );
    println!(
        "  Errors: {} ({:.1}%)",
        stats.error_count,
        stats.failure_rate() * 100.0
    );
    println!();

    if stats.error_count > 0 {
        println!("Failed Sites:");
        for record in run.records.iter().filter(|r| !r.is_success()) {
            println!(
                "  #{} {}: {}",
                record.rank,
                record.url,
                record.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }

    if !run.warnings.is_empty() {
        println!("Warnings:");
        for warning in &run.warnings {
            println!("  - {}", warning);
        }
        println!();
    }
}
