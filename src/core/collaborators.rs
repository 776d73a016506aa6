//! Contracts for the external systems the scoring core depends on
//!
//! All traits are async and backend-agnostic. Local in-memory
//! implementations live in `core::local`.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::types::{ContentUnit, SearchMatch, SearchStrategy, VolumeMetadata, VolumePrior};
use crate::Result;

/// Source content, addressed by page slug
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Ordered chunks of a page. `Error::NotFound` if the page is unknown.
    async fn get_content_units(&self, page_slug: &str) -> Result<Vec<ContentUnit>>;

    /// Metadata of the volume the page belongs to
    async fn get_volume_metadata(&self, page_slug: &str) -> Result<VolumeMetadata>;
}

/// Vector similarity search over content units
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Rank the chunks of the `scope` pages against `query`.
    ///
    /// `MostSimilar` keeps hits scoring at least `threshold`, best first;
    /// `LeastSimilar` keeps hits scoring at most `threshold`, worst first.
    async fn search(
        &self,
        query: &str,
        scope: &[String],
        strategy: SearchStrategy,
        threshold: f64,
        count: usize,
    ) -> Result<Vec<SearchMatch>>;
}

/// Text classifiers; each call is a plain request/response
#[async_trait]
pub trait Scorers: Send + Sync {
    /// Content quality of a summary relative to its source
    async fn score_content(&self, summary: &str, source: &str) -> Result<f64>;

    /// Language quality (wording) of a summary
    async fn score_language(&self, summary: &str) -> Result<f64>;

    /// Detected language code and whether the detection is reliable
    async fn detect_language(&self, text: &str) -> Result<(String, bool)>;

    async fn contains_profanity(&self, tokens: &[String]) -> Result<bool>;

    /// Graded score (0, 1 or 2) of a constructed response
    async fn score_answer(&self, answer: &str, question: &str, reference: &str) -> Result<f64>;
}

/// One item from the dialogue generator
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Token(String),
    /// Nothing after this is part of the response
    EndOfStream,
}

/// Stream of generator output
pub type TokenStream = BoxStream<'static, Result<GenerationEvent>>;

/// Sampling parameters forwarded to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.9,
            max_tokens: 512,
        }
    }
}

/// Remediation dialogue generator
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<TokenStream>;
}

/// Persistent per-volume prior overrides
#[async_trait]
pub trait PriorStore: Send + Sync {
    async fn get_prior(&self, volume_id: &str) -> Result<Option<VolumePrior>>;

    async fn put_prior(&self, volume_id: &str, prior: VolumePrior) -> Result<()>;

    /// Remove an override. `Error::NotFound` if none exists.
    async fn delete_prior(&self, volume_id: &str) -> Result<()>;
}
