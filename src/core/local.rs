//! Local collaborators: in-process stand-ins for the external services
//!
//! Lets the service run end to end without a model server or vector index,
//! and gives tests deterministic behaviour. Scores are lexical heuristics,
//! not model outputs.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use async_trait::async_trait;
use futures_util::stream;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::collaborators::{
    ContentStore, GenerationEvent, Generator, PriorStore, SamplingConfig, Scorers,
    SimilaritySearch, TokenStream,
};
use crate::core::containment::{content_words, is_stop_word, tokenize};
use crate::types::{ContentUnit, SearchMatch, SearchStrategy, VolumeMetadata, VolumePrior};
use crate::{Error, Result};

lazy_static! {
    // =========================================================================
    // Profanity lexicon (whole tokens, common inflections)
    // =========================================================================
    static ref RE_PROFANITY: Regex = Regex::new(
        r"(?i)^(fuck|fucks|fucking|fucked|shit|shits|shitty|bitch|bitches|bastard|bastards|asshole|assholes|dick|dicks|cunt|cunts|crap|damn|damned|piss|pissed|slut|sluts|whore|whores)$"
    ).unwrap();
}

// ---------------------------------------------------------------------------
// MemoryContentStore
// ---------------------------------------------------------------------------

/// A page: its volume metadata and ordered chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub slug: String,
    pub volume: VolumeMetadata,
    pub chunks: Vec<ContentUnit>,
}

/// In-memory content store, optionally loaded from a JSON array of pages
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    pages: RwLock<HashMap<String, PageRecord>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: Vec<PageRecord>) -> Self {
        let pages = pages.into_iter().map(|p| (p.slug.clone(), p)).collect();
        Self { pages: RwLock::new(pages) }
    }

    /// Load pages from a JSON file holding an array of `PageRecord`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let pages: Vec<PageRecord> = serde_json::from_str(&raw)?;
        Ok(Self::from_pages(pages))
    }

    pub async fn insert_page(&self, page: PageRecord) {
        self.pages.write().await.insert(page.slug.clone(), page);
    }

    async fn page(&self, slug: &str) -> Result<PageRecord> {
        self.pages
            .read()
            .await
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("page {}", slug)))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_content_units(&self, page_slug: &str) -> Result<Vec<ContentUnit>> {
        Ok(self.page(page_slug).await?.chunks)
    }

    async fn get_volume_metadata(&self, page_slug: &str) -> Result<VolumeMetadata> {
        Ok(self.page(page_slug).await?.volume)
    }
}

// ---------------------------------------------------------------------------
// LexicalSearch
// ---------------------------------------------------------------------------

/// Word-overlap stand-in for the vector index
pub struct LexicalSearch {
    content: std::sync::Arc<MemoryContentStore>,
}

impl LexicalSearch {
    pub fn new(content: std::sync::Arc<MemoryContentStore>) -> Self {
        Self { content }
    }
}

/// Jaccard overlap of content words; 0.0 when either side has none
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = content_words(a).into_iter().collect();
    let right: HashSet<String> = content_words(b).into_iter().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

#[async_trait]
impl SimilaritySearch for LexicalSearch {
    async fn search(
        &self,
        query: &str,
        scope: &[String],
        strategy: SearchStrategy,
        threshold: f64,
        count: usize,
    ) -> Result<Vec<SearchMatch>> {
        let mut hits = Vec::new();
        for page in scope {
            let chunks = match self.content.get_content_units(page).await {
                Ok(chunks) => chunks,
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            for chunk in chunks {
                let score = word_overlap(query, &chunk.text);
                let keep = match strategy {
                    SearchStrategy::MostSimilar => score >= threshold,
                    SearchStrategy::LeastSimilar => score <= threshold,
                };
                if keep {
                    hits.push(SearchMatch::new(chunk.slug, score));
                }
            }
        }

        // Stable sort keeps page order among equal scores
        match strategy {
            SearchStrategy::MostSimilar => hits.sort_by(|a, b| b.score.total_cmp(&a.score)),
            SearchStrategy::LeastSimilar => hits.sort_by(|a, b| a.score.total_cmp(&b.score)),
        }
        hits.truncate(count);
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// LexicalScorers
// ---------------------------------------------------------------------------

/// Heuristic stand-ins for the model scorers
#[derive(Debug, Default)]
pub struct LexicalScorers;

impl LexicalScorers {
    pub fn new() -> Self {
        Self
    }

    /// Share of the source's content vocabulary the summary touches
    pub fn content_coverage(summary: &str, source: &str) -> f64 {
        let source_vocab: HashSet<String> = content_words(source).into_iter().collect();
        if source_vocab.is_empty() {
            return 0.0;
        }
        let covered = content_words(summary)
            .into_iter()
            .collect::<HashSet<_>>()
            .intersection(&source_vocab)
            .count();
        covered as f64 / source_vocab.len() as f64
    }

    /// 0..=4 wording score from vocabulary variety and length
    pub fn wording(summary: &str) -> f64 {
        let tokens = tokenize(summary);
        if tokens.is_empty() {
            return 0.0;
        }
        let distinct = tokens.iter().collect::<HashSet<_>>().len() as f64;
        let variety = distinct / tokens.len() as f64;
        let length = (tokens.len() as f64 / 40.0).min(1.0);
        (4.0 * variety * length).clamp(0.0, 4.0)
    }

    /// Share of tokens that are English function words
    pub fn english_ratio(text: &str) -> (f64, usize) {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return (0.0, 0);
        }
        let hits = tokens.iter().filter(|t| is_stop_word(t)).count();
        (hits as f64 / tokens.len() as f64, tokens.len())
    }
}

#[async_trait]
impl Scorers for LexicalScorers {
    async fn score_content(&self, summary: &str, source: &str) -> Result<f64> {
        Ok(Self::content_coverage(summary, source))
    }

    async fn score_language(&self, summary: &str) -> Result<f64> {
        Ok(Self::wording(summary))
    }

    async fn detect_language(&self, text: &str) -> Result<(String, bool)> {
        let (ratio, tokens) = Self::english_ratio(text);
        let code = if ratio >= 0.15 { "en" } else { "und" };
        Ok((code.to_string(), tokens >= 5))
    }

    async fn contains_profanity(&self, tokens: &[String]) -> Result<bool> {
        Ok(tokens.iter().any(|t| RE_PROFANITY.is_match(t)))
    }

    async fn score_answer(&self, answer: &str, _question: &str, reference: &str) -> Result<f64> {
        let overlap = Self::content_coverage(answer, reference);
        Ok(if overlap >= 0.5 {
            2.0
        } else if overlap >= 0.2 {
            1.0
        } else {
            0.0
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Streams a fixed reply word by word, then end-of-stream
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    script: String,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new("In your own words, what is the main idea of this passage?")
    }
}

impl ScriptedGenerator {
    pub fn new(script: impl Into<String>) -> Self {
        Self { script: script.into() }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, sampling: &SamplingConfig) -> Result<TokenStream> {
        let mut events: Vec<Result<GenerationEvent>> = self
            .script
            .split_inclusive(' ')
            .take(sampling.max_tokens as usize)
            .map(|word| Ok(GenerationEvent::Token(word.to_string())))
            .collect();
        events.push(Ok(GenerationEvent::EndOfStream));
        Ok(Box::pin(stream::iter(events)))
    }
}

// ---------------------------------------------------------------------------
// MemoryPriorStore
// ---------------------------------------------------------------------------

/// In-memory prior overrides
#[derive(Debug, Default)]
pub struct MemoryPriorStore {
    priors: RwLock<HashMap<String, VolumePrior>>,
}

impl MemoryPriorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriorStore for MemoryPriorStore {
    async fn get_prior(&self, volume_id: &str) -> Result<Option<VolumePrior>> {
        Ok(self.priors.read().await.get(volume_id).cloned())
    }

    async fn put_prior(&self, volume_id: &str, prior: VolumePrior) -> Result<()> {
        self.priors.write().await.insert(volume_id.to_string(), prior);
        Ok(())
    }

    async fn delete_prior(&self, volume_id: &str) -> Result<()> {
        self.priors
            .write()
            .await
            .remove(volume_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("prior for volume {}", volume_id)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::Arc;

    fn store() -> Arc<MemoryContentStore> {
        Arc::new(MemoryContentStore::from_pages(vec![PageRecord {
            slug: "page-1".into(),
            volume: VolumeMetadata {
                volume_id: "econ".into(),
                title: "Principles".into(),
                description: String::new(),
            },
            chunks: vec![
                ContentUnit::new("scarcity", "Scarcity forces choices between competing uses."),
                ContentUnit::new("markets", "Markets coordinate buyers and sellers through prices."),
                ContentUnit::new("policy", "Governments tax, spend and regulate industries."),
            ],
        }]))
    }

    #[tokio::test]
    async fn test_missing_page_is_not_found() {
        let err = store().get_content_units("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_orders_by_strategy() {
        let search = LexicalSearch::new(store());
        let scope = vec!["page-1".to_string()];
        let query = "Markets use prices to coordinate buyers";

        let most = search.search(query, &scope, SearchStrategy::MostSimilar, 0.0, 1).await.unwrap();
        assert_eq!(most[0].slug, "markets");

        let least = search.search(query, &scope, SearchStrategy::LeastSimilar, 1.0, 3).await.unwrap();
        assert_eq!(least.len(), 3);
        assert_eq!(least.last().unwrap().slug, "markets");
        assert!(least[0].score <= least[1].score);
    }

    #[tokio::test]
    async fn test_profanity_matches_whole_tokens() {
        let scorers = LexicalScorers::new();
        let dirty = tokenize("This shit is hard");
        let clean = tokenize("The Shittim wood was scrapped");
        assert!(scorers.contains_profanity(&dirty).await.unwrap());
        assert!(!scorers.contains_profanity(&clean).await.unwrap());
    }

    #[tokio::test]
    async fn test_language_detection() {
        let scorers = LexicalScorers::new();
        let (code, reliable) = scorers
            .detect_language("The market is where the buyers and the sellers meet.")
            .await
            .unwrap();
        assert_eq!(code, "en");
        assert!(reliable);

        let (code, _) = scorers
            .detect_language("Der Markt koordiniert Käufer und Verkäufer durch Preise.")
            .await
            .unwrap();
        assert_eq!(code, "und");
    }

    #[tokio::test]
    async fn test_scripted_generator_ends_with_marker() {
        let generator = ScriptedGenerator::new("Why do prices rise?");
        let events: Vec<GenerationEvent> = generator
            .generate("prompt", &SamplingConfig::default())
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], GenerationEvent::Token("Why ".into()));
        assert_eq!(events[4], GenerationEvent::EndOfStream);
    }

    #[tokio::test]
    async fn test_answer_grades() {
        let scorers = LexicalScorers::new();
        let reference = "Prices signal scarcity to buyers and sellers.";
        assert_eq!(scorers.score_answer("Prices signal scarcity to buyers", "q", reference).await.unwrap(), 2.0);
        assert_eq!(scorers.score_answer("I like turtles", "q", reference).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_prior_store_delete_missing() {
        let priors = MemoryPriorStore::new();
        assert!(priors.get_prior("v").await.unwrap().is_none());
        priors.put_prior("v", VolumePrior::default()).await.unwrap();
        priors.delete_prior("v").await.unwrap();
        assert!(matches!(priors.delete_prior("v").await, Err(Error::NotFound(_))));
    }
}
