//! Feedback compiler: raw sub-scores → pass/fail + message
//!
//! Rules come from a declarative table, one per named sub-score. A rule
//! with two or fewer messages indexes them by outcome (0 = fail, 1 = pass);
//! a rule with more indexes them by `floor(score)` for graded tiers.

use std::collections::HashMap;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::types::{AnalyticResult, Evaluation};
use crate::{Error, Result};

// =============================================================================
// SUB-SCORE NAMES
// =============================================================================

pub const CONTAINMENT: &str = "containment";
pub const CONTAINMENT_CHAT: &str = "containment_chat";
pub const SIMILARITY: &str = "similarity";
pub const LANGUAGE_ID: &str = "english";
pub const PROFANITY: &str = "profanity";
pub const CONTENT: &str = "content";
pub const LANGUAGE: &str = "language";
pub const ANSWER: &str = "answer";

/// How a score is compared against its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comparator {
    GreaterThan,
    LessThan,
    /// Inclusive upper bound; ceilings trip only when exceeded
    AtMost,
    Equal,
}

impl Comparator {
    /// True when `score` passes against `threshold`
    pub fn holds(&self, score: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => score > threshold,
            Comparator::LessThan => score < threshold,
            Comparator::AtMost => score <= threshold,
            Comparator::Equal => (score - threshold).abs() < f64::EPSILON,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::GreaterThan => "greater_than",
            Comparator::LessThan => "less_than",
            Comparator::AtMost => "at_most",
            Comparator::Equal => "equal",
        }
    }
}

impl FromStr for Comparator {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "greater_than" | "gt" | ">" => Ok(Comparator::GreaterThan),
            "less_than" | "lt" | "<" => Ok(Comparator::LessThan),
            "at_most" | "le" | "<=" => Ok(Comparator::AtMost),
            "equal" | "eq" | "==" => Ok(Comparator::Equal),
            other => Err(Error::Config(format!("unknown comparator: {:?}", other))),
        }
    }
}

impl TryFrom<String> for Comparator {
    type Error = Error;

    fn try_from(tag: String) -> Result<Self> {
        tag.parse()
    }
}

impl From<Comparator> for String {
    fn from(comparator: Comparator) -> Self {
        comparator.as_str().to_string()
    }
}

/// One row of the declarative rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRule {
    pub name: String,
    pub comparator: Comparator,
    /// Static threshold; None means it is supplied at compile time
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl FeedbackRule {
    /// Build a rule from a comparator tag, rejecting unknown tags
    pub fn parse(
        name: &str,
        comparator: &str,
        threshold: Option<f64>,
        messages: &[&str],
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            comparator: comparator.parse()?,
            threshold,
            messages: messages.iter().map(|m| m.to_string()).collect(),
        })
    }

    /// Compile a sub-score against the given threshold
    pub fn compile(&self, evaluation: Evaluation, threshold: f64) -> AnalyticResult {
        let raw = match evaluation {
            Evaluation::Skipped => return AnalyticResult::skipped(&self.name, Some(threshold)),
            Evaluation::Evaluated(raw) => raw,
        };

        let score = raw.as_f64();
        let passed = self.comparator.holds(score, threshold);

        AnalyticResult {
            name: self.name.clone(),
            raw_score: Some(raw),
            threshold: Some(threshold),
            is_passed: Some(passed),
            message: self.select_message(score, passed),
        }
    }

    fn select_message(&self, score: f64, passed: bool) -> Option<String> {
        if self.messages.len() <= 2 {
            return self.messages.get(usize::from(passed)).cloned();
        }
        // Graded tiers; out-of-range scores land on the nearest tier
        let top = (self.messages.len() - 1) as f64;
        let tier = if score.is_finite() { score.floor().clamp(0.0, top) } else { 0.0 };
        self.messages.get(tier as usize).cloned()
    }
}

/// Compiled rule table, keyed by sub-score name
#[derive(Debug, Clone)]
pub struct FeedbackCompiler {
    rules: HashMap<String, FeedbackRule>,
}

impl FeedbackCompiler {
    /// Compile a rule table, rejecting duplicates and malformed thresholds
    pub fn new(rules: Vec<FeedbackRule>) -> Result<Self> {
        let mut table = HashMap::with_capacity(rules.len());
        for rule in rules {
            if rule.name.trim().is_empty() {
                return Err(Error::Config("feedback rule with empty name".into()));
            }
            if matches!(rule.threshold, Some(t) if !t.is_finite()) {
                return Err(Error::Config(format!("rule {} has a non-finite threshold", rule.name)));
            }
            if table.contains_key(&rule.name) {
                return Err(Error::Config(format!("duplicate feedback rule: {}", rule.name)));
            }
            table.insert(rule.name.clone(), rule);
        }
        Ok(Self { rules: table })
    }

    pub fn rule(&self, name: &str) -> Option<&FeedbackRule> {
        self.rules.get(name)
    }

    /// Compile with the rule's static threshold
    pub fn compile(&self, name: &str, evaluation: impl Into<Evaluation>) -> Result<AnalyticResult> {
        let rule = self.lookup(name)?;
        let threshold = rule.threshold.ok_or_else(|| {
            Error::Precondition(format!("rule {} needs a threshold supplied at compile time", name))
        })?;
        Ok(rule.compile(evaluation.into(), threshold))
    }

    /// Compile with a threshold supplied by the caller (e.g. the estimator)
    pub fn compile_with_threshold(
        &self,
        name: &str,
        evaluation: impl Into<Evaluation>,
        threshold: f64,
    ) -> Result<AnalyticResult> {
        let rule = self.lookup(name)?;
        Ok(rule.compile(evaluation.into(), threshold))
    }

    /// A skipped sub-score whose dynamic threshold was never resolved
    pub fn skip(&self, name: &str) -> Result<AnalyticResult> {
        let rule = self.lookup(name)?;
        Ok(AnalyticResult::skipped(&rule.name, rule.threshold))
    }

    fn lookup(&self, name: &str) -> Result<&FeedbackRule> {
        self.rules
            .get(name)
            .ok_or_else(|| Error::Precondition(format!("no feedback rule named {}", name)))
    }
}

/// Rule table used when the configuration does not provide one
pub fn default_rules() -> Vec<FeedbackRule> {
    let rule = |name: &str, comparator, threshold, messages: &[&str]| FeedbackRule {
        name: name.to_string(),
        comparator,
        threshold,
        messages: messages.iter().map(|m| m.to_string()).collect(),
    };

    vec![
        rule(CONTAINMENT, Comparator::AtMost, None, &[
            "You need to rely less on the language in the text. Focus on writing in your own words.",
            "You did a good job of using your own words.",
        ]),
        rule(CONTAINMENT_CHAT, Comparator::AtMost, None, &[
            "You need to rely less on the language from the conversation. Focus on writing in your own words.",
            "You did a good job of using your own words.",
        ]),
        rule(SIMILARITY, Comparator::AtMost, None, &[
            "Your summary follows the text too closely. Restate the ideas instead of echoing them.",
            "You restated the ideas of the text.",
        ]),
        rule(LANGUAGE_ID, Comparator::Equal, Some(1.0), &[
            "Please write your summary in English.",
            "",
        ]),
        rule(PROFANITY, Comparator::Equal, Some(0.0), &[
            "Please avoid inappropriate language in your summary.",
            "",
        ]),
        rule(CONTENT, Comparator::GreaterThan, None, &[
            "You need to include more key ideas from the text in your summary.",
            "You did a good job including key ideas from the text.",
        ]),
        rule(LANGUAGE, Comparator::GreaterThan, Some(crate::LANGUAGE_THRESHOLD), &[
            "Your summary needs clearer wording and more varied vocabulary.",
            "Try to vary your vocabulary and sentence structure.",
            "Your wording is clear. Some sentences could be tightened.",
            "Your wording is clear and well structured.",
        ]),
        rule(ANSWER, Comparator::GreaterThan, Some(crate::ANSWER_THRESHOLD), &[
            "Your answer does not address the question yet. Reread the passage and try again.",
            "Your answer is on the right track but misses part of the idea.",
            "Your answer captures the idea of the passage.",
        ]),
    ]
}

// =============================================================================
// TESTS
// =============================================================================
