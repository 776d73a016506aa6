//! Source content units and remediation candidates

use serde::{Deserialize, Serialize};

/// One chunk of source text, fetched fresh per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub slug: String,
    pub text: String,
    /// Constructed-response question attached to the chunk
    #[serde(default)]
    pub question: Option<String>,
    /// Reference answer for the question
    #[serde(default)]
    pub answer: Option<String>,
}

impl ContentUnit {
    pub fn new(slug: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            text: text.into(),
            question: None,
            answer: None,
        }
    }

    /// Attach a question and its reference answer
    pub fn with_question(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self.answer = Some(answer.into());
        self
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Descriptive metadata for the volume a page belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetadata {
    pub volume_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Which end of the similarity ranking to retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    MostSimilar,
    LeastSimilar,
}

/// One hit from the similarity search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Slug of the matched content unit
    pub slug: String,
    /// Similarity of the unit to the query (higher = more similar)
    pub score: f64,
}

impl SearchMatch {
    pub fn new(slug: impl Into<String>, score: f64) -> Self {
        Self { slug: slug.into(), score }
    }
}

/// A chunk considered for remediation, with its derived priority
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationCandidate {
    pub unit: ContentUnit,
    /// Reading weight (relative time spent on the chunk)
    pub weight: f64,
    /// Score reported by the least-similar search
    pub similarity: f64,
    /// weight * similarity; the minimum wins
    pub priority: f64,
}

/// Kinds of follow-up question the dialogue generator can ask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Paraphrasing,
    Elaboration,
    Logic,
    Prediction,
    Bridging,
}

impl QuestionType {
    /// Full taxonomy, sampled uniformly
    pub const ALL: [QuestionType; 5] = [
        QuestionType::Paraphrasing,
        QuestionType::Elaboration,
        QuestionType::Logic,
        QuestionType::Prediction,
        QuestionType::Bridging,
    ];

    /// Instruction given to the generator for this question type
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Paraphrasing => "Ask the student to restate a key idea of the passage in their own words.",
            Self::Elaboration => "Ask the student to connect the passage to their background knowledge.",
            Self::Logic => "Ask the student to reason about why an idea in the passage holds.",
            Self::Prediction => "Ask the student to predict what follows from the passage.",
            Self::Bridging => "Ask the student how this passage connects to earlier material.",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Paraphrasing => "paraphrasing",
            Self::Elaboration => "elaboration",
            Self::Logic => "logic",
            Self::Prediction => "prediction",
            Self::Bridging => "bridging",
        };
        write!(f, "{}", name)
    }
}
