//! Reason codes for gating short-circuits

use serde::{Deserialize, Serialize};

/// Why the gate stopped a summary before full scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum GateReason {
    /// Summary copies too much of the source
    G001_CONTAINMENT_CEILING,
    /// Summary copies too much of the prior dialogue
    G002_CHAT_CONTAINMENT_CEILING,
    /// Summary paraphrases the source too closely
    G003_SIMILARITY_CEILING,
    /// Summary not written in the target language
    G004_WRONG_LANGUAGE,
    /// Summary contains profanity
    G005_PROFANITY,
}

impl GateReason {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::G001_CONTAINMENT_CEILING => "G001_CONTAINMENT_CEILING",
            Self::G002_CHAT_CONTAINMENT_CEILING => "G002_CHAT_CONTAINMENT_CEILING",
            Self::G003_SIMILARITY_CEILING => "G003_SIMILARITY_CEILING",
            Self::G004_WRONG_LANGUAGE => "G004_WRONG_LANGUAGE",
            Self::G005_PROFANITY => "G005_PROFANITY",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::G001_CONTAINMENT_CEILING => "Too much text borrowed from the source",
            Self::G002_CHAT_CONTAINMENT_CEILING => "Too much text borrowed from the dialogue",
            Self::G003_SIMILARITY_CEILING => "Too close a paraphrase of the source",
            Self::G004_WRONG_LANGUAGE => "Not written in the target language",
            Self::G005_PROFANITY => "Contains inappropriate language",
        }
    }
}

impl std::fmt::Display for GateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
