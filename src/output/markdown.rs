//! Markdown report generation
//!
//! This module renders a completed run as a human-readable markdown report,
//! including statistics, the per-site results table and any failures.

use crate::model::Run;
use crate::output::stats::reduce_stats;
use crate::url::site_domain;
use crate::ScoutError;
use std::io::Write;

/// Writes the markdown report for `run` to `writer`
pub fn write_markdown<W: Write>(run: &Run, mut writer: W) -> Result<(), ScoutError> {
    writer.write_all(format_markdown_report(run).as_bytes())?;
    Ok(())
}

/// Formats a run as markdown
///
/// # Arguments
///
/// * `run` - The completed run
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_report(run: &Run) -> String {
    let stats = reduce_stats(&run.records);
    let mut md = String::new();

    md.push_str(&format!(
        "# Sitescout Report: {}\n\n",
        escape_markdown(&run.keyword)
    ));

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(id) = run.saved_as {
        md.push_str(&format!("- **Run ID**: {}\n", id));
    }
    md.push_str(&format!("- **Keyword**: {}\n", escape_markdown(&run.keyword)));
    md.push_str(&format!("- **Region**: {}\n", run.region));
    md.push_str(&format!(
        "- **Completed**: {}\n\n",
        run.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Sites Analyzed**: {}\n", stats.total_sites));
    md.push_str(&format!(
        "- **Average Load Time**: {:.2}s\n",
        stats.average_load_time
    ));
    md.push_str(&format!(
        "- **WordPress Sites**: {} ({:.1}%)\n",
        stats.wordpress_sites,
        stats.wordpress_share() * 100.0
    ));
    md.push_str(&format!(
        "- **Errors**: {} ({:.1}%)\n\n",
        stats.error_count,
        stats.failure_rate() * 100.0
    ));

    // Results table
    if !run.records.is_empty() {
        md.push_str("## Results\n\n");
        md.push_str("| Rank | Business | Site | Load (s) | LCP (s) | CLS | FID (ms) | Perf | SEO | A11y | WordPress | Status |\n");
        md.push_str("|------|----------|------|----------|---------|-----|----------|------|-----|------|-----------|--------|\n");

        for record in &run.records {
            let site = site_domain(&record.url).unwrap_or_else(|_| record.url.clone());
            md.push_str(&format!(
                "| {} | {} | [{}]({}) | {:.2} | {:.2} | {:.3} | {} | {} | {} | {} | {} | {} |\n",
                record.rank,
                escape_markdown(&record.business_name),
                escape_markdown(&site),
                record.url,
                record.page_load_time,
                record.lcp,
                record.cls,
                record.fid,
                score(record.performance),
                score(record.seo),
                score(record.accessibility),
                if record.is_word_press { "yes" } else { "no" },
                record.status,
            ));
        }
        md.push('\n');
    }

    // Failures
    let failures: Vec<_> = run.records.iter().filter(|r| !r.is_success()).collect();
    if !failures.is_empty() {
        md.push_str("## Failed Sites\n\n");
        for record in failures {
            md.push_str(&format!(
                "- #{} {}: {}\n",
                record.rank,
                record.url,
                escape_markdown(record.error_message.as_deref().unwrap_or("unknown error"))
            ));
        }
        md.push('\n');
    }

    if !run.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warning in &run.warnings {
            md.push_str(&format!("- {}\n", escape_markdown(warning)));
        }
        md.push('\n');
    }

    md
}

/// Category score as a whole number out of 100
fn score(value: f64) -> u32 {
    (value * 100.0).round() as u32
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('*', "\\*").replace('_', "\\_")
}
