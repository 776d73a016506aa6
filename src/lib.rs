//! Readcheck: summary scoring and adaptive remediation
//!
//! Scores student summaries against source text through cheap gating checks
//! and (when those pass) model scorers, calibrates the content threshold per
//! volume from observed scores, and streams a remediation dialogue when the
//! student misses the mark.

pub mod config;
pub mod core;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};

// =============================================================================
// GATING CEILINGS
// =============================================================================

/// Containment above this means the summary copies too much of the source
pub const CONTAINMENT_CEILING: f64 = 0.6;

/// Topical similarity above this means the summary paraphrases too closely
pub const SIMILARITY_CEILING: f64 = 0.95;

/// Language code summaries must be written in
pub const TARGET_LANGUAGE: &str = "en";

// =============================================================================
// THRESHOLD ESTIMATOR DEFAULTS
// =============================================================================

/// Global prior mean of the content score distribution
pub const PRIOR_MEAN: f64 = 0.2;

/// Global prior pseudo-count (observations the prior is worth)
pub const PRIOR_SUPPORT: f64 = 10.0;

/// Global prior inverse-gamma shape
pub const PRIOR_ALPHA: f64 = 2.0;

/// Global prior inverse-gamma scale
pub const PRIOR_BETA: f64 = 1.0;

/// Percentile of the "normal" score distribution used as the pass threshold
pub const TARGET_PERCENTILE: f64 = 0.20;

// =============================================================================
// FEEDBACK THRESHOLDS
// =============================================================================

/// Language-quality score needed to pass
pub const LANGUAGE_THRESHOLD: f64 = 1.5;

/// Constructed-response score needed to pass (graded 0, 1, 2)
pub const ANSWER_THRESHOLD: f64 = 0.5;

// =============================================================================
// REMEDIATION
// =============================================================================

/// Words read per unit of focus time at a normal pace
pub const READING_RATE: f64 = 4.0;

/// Number of least-similar chunks requested from the search index
pub const REMEDIATION_CANDIDATES: usize = 5;

/// Character budget for the chunk text handed to the generator
pub const CHUNK_CHAR_BUDGET: usize = 2000;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
