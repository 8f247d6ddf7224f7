//! Run status and progress snapshots
//!
//! This module defines the states a run moves through and the snapshot
//! observers receive while it is in flight.

use std::fmt;

/// Lifecycle of a single run: `Idle -> Analyzing -> {Completed | Error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunStatus {
    /// No run has started yet
    #[default]
    Idle,

    /// Search results are being collected or candidates analyzed
    Analyzing,

    // ===== Terminal States =====
    /// Every candidate went through the analyzer, whatever its outcome
    Completed,

    /// The run aborted (no caller identity, no candidates, quota, cancel)
    Error,
}

impl RunStatus {
    /// Returns true if no further transitions occur from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns true if `next` is a legal successor of this state
    ///
    /// A terminal state may restart into `Analyzing`: every run is a fresh
    /// submission on the same orchestrator.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (Self::Idle, Self::Analyzing | Self::Error) => true,
            (Self::Analyzing, Self::Analyzing | Self::Completed | Self::Error) => true,
            (Self::Completed | Self::Error, Self::Analyzing | Self::Error) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot of a run's progress
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressState {
    pub status: RunStatus,

    /// Processed candidates over total, in [0, 1]
    pub progress_fraction: f64,

    /// Candidate that most recently finished
    pub current_url: Option<String>,

    /// Set only in the `Error` state
    pub error: Option<String>,
}

impl ProgressState {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Snapshot for a run in flight; the fraction is clamped into [0, 1]
    pub fn analyzing(progress_fraction: f64, current_url: Option<String>) -> Self {
        Self {
            status: RunStatus::Analyzing,
            progress_fraction: progress_fraction.clamp(0.0, 1.0),
            current_url,
            error: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: RunStatus::Completed,
            progress_fraction: 1.0,
            current_url: None,
            error: None,
        }
    }

    /// Terminal failure, keeping the fraction reached so far
    pub fn failed(progress_fraction: f64, error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            progress_fraction: progress_fraction.clamp(0.0, 1.0),
            current_url: None,
            error: Some(error.into()),
        }
    }

    /// Progress as a whole percentage for display
    pub fn percent(&self) -> u64 {
        (self.progress_fraction * 100.0).round() as u64
    }
}
