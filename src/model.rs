//! Core data model for analysis runs
//!
//! - `Candidate`: one search hit awaiting analysis
//! - `AnalysisRecord`: the finalized per-URL outcome
//! - `Run`: one complete keyword batch, handed to storage when finished

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One search hit, immutable once produced by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    /// 1-based position in the merged search order
    pub rank: u32,
}

/// Outcome of analyzing a single candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully processed candidate
///
/// Scores are fractions in [0, 1]. `page_load_time` and `lcp` are seconds,
/// `fid` is whole milliseconds, `cls` is unitless and unbounded above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub url: String,
    pub business_name: String,
    pub rank: u32,
    pub page_load_time: f64,
    pub lcp: f64,
    pub cls: f64,
    pub fid: u32,
    pub performance: f64,
    pub seo: f64,
    pub accessibility: f64,
    pub is_word_press: bool,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AnalysisRecord {
    /// Builds an error record with every numeric field zeroed
    pub fn failed(candidate: &Candidate, message: impl Into<String>) -> Self {
        Self {
            url: candidate.url.clone(),
            business_name: candidate.title.clone(),
            rank: candidate.rank,
            page_load_time: 0.0,
            lcp: 0.0,
            cls: 0.0,
            fid: 0,
            performance: 0.0,
            seo: 0.0,
            accessibility: 0.0,
            is_word_press: false,
            status: RecordStatus::Error,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}

/// Search market the keyword is run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchRegion {
    #[default]
    Com,
    ComAu,
    CoNz,
    CoUk,
    Ca,
    De,
}

impl SearchRegion {
    /// All supported regions, in display order
    pub const ALL: [SearchRegion; 6] = [
        Self::Com,
        Self::ComAu,
        Self::CoNz,
        Self::CoUk,
        Self::Ca,
        Self::De,
    ];

    /// Google domain suffix, e.g. ".co.uk"
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Com => ".com",
            Self::ComAu => ".com.au",
            Self::CoNz => ".co.nz",
            Self::CoUk => ".co.uk",
            Self::Ca => ".ca",
            Self::De => ".de",
        }
    }

    /// Country code for the search API's `gl` parameter
    pub fn country_code(&self) -> &'static str {
        match self {
            Self::Com => "us",
            Self::ComAu => "au",
            Self::CoNz => "nz",
            Self::CoUk => "uk",
            Self::Ca => "ca",
            Self::De => "de",
        }
    }
}

impl FromStr for SearchRegion {
    type Err = String;

    /// Accepts the suffix with or without the leading dot
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.suffix().trim_start_matches('.') == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown search region '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(|r| r.suffix()).join(", ")
                )
            })
    }
}

impl fmt::Display for SearchRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.suffix())
    }
}

/// Opaque, non-empty identity of whoever starts a run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    /// Returns `None` for empty or whitespace-only input
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One complete keyword analysis batch
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub caller: CallerId,
    pub keyword: String,
    pub region: SearchRegion,
    /// Ordered by rank
    pub records: Vec<AnalysisRecord>,
    pub completed_at: DateTime<Utc>,
    /// Non-fatal problems: dropped search pages, persistence failure
    pub warnings: Vec<String>,
    /// Store id, once the run has been persisted
    pub saved_as: Option<i64>,
}

impl Run {
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_success()).count()
    }

    /// True when the run completed but some rows need inspecting
    pub fn has_item_failures(&self) -> bool {
        self.error_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            url: "https://example.com/".to_string(),
            title: "Example Plumbing".to_string(),
            rank: 3,
        }
    }

    #[test]
    fn test_failed_record_is_zeroed() {
        let record = AnalysisRecord::failed(&candidate(), "timeout");
        assert_eq!(record.rank, 3);
        assert_eq!(record.status, RecordStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("timeout"));
        assert_eq!(record.page_load_time, 0.0);
        assert_eq!(record.fid, 0);
        assert!(!record.is_word_press);
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let record = AnalysisRecord::failed(&candidate(), "boom");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["businessName"], "Example Plumbing");
        assert_eq!(json["isWordPress"], false);
        assert_eq!(json["status"], "error");
        assert_eq!(json["errorMessage"], "boom");
    }

    #[test]
    fn test_success_record_omits_error_message() {
        let mut record = AnalysisRecord::failed(&candidate(), "x");
        record.status = RecordStatus::Success;
        record.error_message = None;
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("errorMessage"));
    }

    #[test]
    fn test_region_parsing() {
        assert_eq!("com.au".parse::<SearchRegion>().unwrap(), SearchRegion::ComAu);
        assert_eq!(".co.uk".parse::<SearchRegion>().unwrap(), SearchRegion::CoUk);
        assert_eq!(".DE".parse::<SearchRegion>().unwrap(), SearchRegion::De);
        assert!(".fr".parse::<SearchRegion>().is_err());
    }

    #[test]
    fn test_region_country_codes() {
        assert_eq!(SearchRegion::Com.country_code(), "us");
        assert_eq!(SearchRegion::CoNz.country_code(), "nz");
        assert_eq!(SearchRegion::ComAu.to_string(), ".com.au");
    }

    #[test]
    fn test_caller_id_rejects_blank() {
        assert!(CallerId::new("").is_none());
        assert!(CallerId::new("   ").is_none());
        assert_eq!(CallerId::new("user-1").unwrap().as_str(), "user-1");
    }
}
