//! Caller-supplied request bodies

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A summary to score against one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub page_slug: String,
    pub summary: String,
    /// Focus time per chunk slug; unobserved chunks count as one unit
    #[serde(default)]
    pub focus_time: HashMap<String, f64>,
    /// Prior remediation dialogue, checked for copying
    #[serde(default)]
    pub chat_history: Option<String>,
    /// Chunks whose questions the student already passed
    #[serde(default)]
    pub excluded_chunks: Vec<String>,
}

impl SummaryRequest {
    pub fn new(page_slug: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            page_slug: page_slug.into(),
            summary: summary.into(),
            focus_time: HashMap::new(),
            chat_history: None,
            excluded_chunks: Vec::new(),
        }
    }

    /// Reject malformed input before any collaborator is called
    pub fn validate(&self) -> Result<()> {
        if self.page_slug.trim().is_empty() {
            return Err(Error::Validation("page_slug is required".into()));
        }
        if self.summary.trim().is_empty() {
            return Err(Error::Validation("summary must not be empty".into()));
        }
        if let Some((slug, _)) = self.focus_time.iter().find(|(_, t)| !t.is_finite() || **t < 0.0) {
            return Err(Error::Validation(format!("focus time for {} must be a non-negative number", slug)));
        }
        Ok(())
    }
}

/// A constructed response to a chunk's question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub page_slug: String,
    pub chunk_slug: String,
    pub answer: String,
}

impl AnswerRequest {
    pub fn validate(&self) -> Result<()> {
        if self.page_slug.trim().is_empty() || self.chunk_slug.trim().is_empty() {
            return Err(Error::Validation("page_slug and chunk_slug are both required".into()));
        }
        if self.answer.trim().is_empty() {
            return Err(Error::Validation("answer must not be empty".into()));
        }
        Ok(())
    }
}

/// Score history to fold into a volume's prior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreObservations {
    pub scores: Vec<f64>,
}

impl ScoreObservations {
    pub fn validate(&self) -> Result<()> {
        if self.scores.iter().any(|s| !s.is_finite()) {
            return Err(Error::Validation("scores must be finite numbers".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_summary_rejected() {
        let req = SummaryRequest::new("page-1", "   ");
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_negative_focus_time_rejected() {
        let mut req = SummaryRequest::new("page-1", "A summary.");
        req.focus_time.insert("chunk-1".into(), -3.0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: SummaryRequest =
            serde_json::from_str(r#"{"page_slug": "p", "summary": "s"}"#).unwrap();
        assert!(req.focus_time.is_empty());
        assert!(req.excluded_chunks.is_empty());
        assert!(req.validate().is_ok());
    }
}
