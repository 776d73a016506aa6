//! Pipeline state definitions

use serde::{Deserialize, Serialize};

/// Where a summary assessment ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentState {
    /// Source content and volume metadata retrieved
    Fetched,
    /// Cheap gating sub-scores computed
    Gated,
    /// A gate tripped; expensive scorers were skipped
    ShortCircuited,
    /// Every scorer ran
    FullyScored,
}

impl std::fmt::Display for AssessmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssessmentState::Fetched => "FETCHED",
            AssessmentState::Gated => "GATED",
            AssessmentState::ShortCircuited => "SHORT_CIRCUITED",
            AssessmentState::FullyScored => "FULLY_SCORED",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle of a framed output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamState {
    /// No frame seen yet
    Idle,
    /// At least one frame forwarded
    Streaming,
    /// Source exhausted or dropped; signalled once
    Completed,
}
