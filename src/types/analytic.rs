//! Sub-score and aggregate assessment results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AssessmentState, GateReason};

/// A raw sub-score as produced by a gate or scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScore {
    Flag(bool),
    Value(f64),
}

impl RawScore {
    /// Numeric view used by comparators (flags map to 0.0 / 1.0)
    pub fn as_f64(&self) -> f64 {
        match self {
            RawScore::Flag(true) => 1.0,
            RawScore::Flag(false) => 0.0,
            RawScore::Value(v) => *v,
        }
    }
}

/// Whether a sub-score was computed at all
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Not computed (gating short-circuit or missing input)
    Skipped,
    /// Computed with this raw score
    Evaluated(RawScore),
}

impl From<f64> for Evaluation {
    fn from(value: f64) -> Self {
        Evaluation::Evaluated(RawScore::Value(value))
    }
}

impl From<bool> for Evaluation {
    fn from(flag: bool) -> Self {
        Evaluation::Evaluated(RawScore::Flag(flag))
    }
}

impl<T: Into<Evaluation>> From<Option<T>> for Evaluation {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Evaluation::Skipped)
    }
}

/// One named sub-score of an assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticResult {
    pub name: String,
    pub raw_score: Option<RawScore>,
    /// None when a dynamic threshold was never resolved
    pub threshold: Option<f64>,
    /// None when the sub-score was skipped
    pub is_passed: Option<bool>,
    pub message: Option<String>,
}

impl AnalyticResult {
    /// A skipped sub-score: never blocks the aggregate
    pub fn skipped(name: impl Into<String>, threshold: Option<f64>) -> Self {
        Self {
            name: name.into(),
            raw_score: None,
            threshold,
            is_passed: None,
            message: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.is_passed == Some(false)
    }
}

/// Aggregate result of scoring one summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub overall_passed: bool,
    pub prompt: String,
    pub state: AssessmentState,
    pub sub_results: Vec<AnalyticResult>,
    /// Why the gate short-circuited, empty when fully scored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gate_reasons: Vec<GateReason>,
    pub scored_at: DateTime<Utc>,
}

impl AssessmentResult {
    /// Compose the aggregate; the prompt is picked by the pass/fail outcome
    pub fn new(
        state: AssessmentState,
        sub_results: Vec<AnalyticResult>,
        gate_reasons: Vec<GateReason>,
        pass_prompt: &str,
        fail_prompt: &str,
    ) -> Self {
        let overall_passed = !sub_results.iter().any(AnalyticResult::is_failed);
        let prompt = if overall_passed { pass_prompt } else { fail_prompt };
        Self {
            overall_passed,
            prompt: prompt.to_string(),
            state,
            sub_results,
            gate_reasons,
            scored_at: Utc::now(),
        }
    }

    /// Look up a sub-result by name
    pub fn get(&self, name: &str) -> Option<&AnalyticResult> {
        self.sub_results.iter().find(|r| r.name == name)
    }

    /// True when the named sub-result was evaluated and failed
    pub fn is_failing(&self, name: &str) -> bool {
        self.get(name).map(AnalyticResult::is_failed).unwrap_or(false)
    }
}
