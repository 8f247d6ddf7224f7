//! State module for tracking run progress and quota consumption
//!
//! # Components
//!
//! - `RunStatus` / `ProgressState`: lifecycle of a run and the snapshots observers receive
//! - `QuotaWindow`: per-key call count inside a sliding 24-hour window

mod progress;
mod quota;

// Re-export main types
pub use progress::{ProgressState, RunStatus};
pub use quota::{QuotaWindow, QUOTA_WINDOW_HOURS};
