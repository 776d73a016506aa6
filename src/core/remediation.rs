//! Remediation selector: which chunk the student must revisit
//!
//! Retrieval is inverted: the search index is asked for the chunks LEAST
//! similar to the summary, i.e. what the student most likely failed to
//! cover. Each hit is weighted by relative reading time and the chunk with
//! the smallest `weight * similarity` wins (least read, least covered).

use std::collections::HashMap;
use std::sync::Arc;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::core::collaborators::SimilaritySearch;
use crate::core::weighting::ChunkWeighter;
use crate::types::{ContentUnit, QuestionType, RemediationCandidate, SearchStrategy};
use crate::{Error, Result};

/// Everything the generator needs to open a remediation dialogue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationPlan {
    pub target_chunk: String,
    pub question_type: QuestionType,
    /// Chunk text cut to the character budget
    pub excerpt: String,
    pub prompt: String,
}

pub struct RemediationSelector {
    search: Arc<dyn SimilaritySearch>,
    weighter: ChunkWeighter,
    candidate_count: usize,
    search_threshold: f64,
    char_budget: usize,
}

impl RemediationSelector {
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        weighter: ChunkWeighter,
        candidate_count: usize,
        search_threshold: f64,
        char_budget: usize,
    ) -> Self {
        Self {
            search,
            weighter,
            candidate_count,
            search_threshold,
            char_budget,
        }
    }

    /// Pick the chunk to remediate for this summary.
    ///
    /// Chunks in `excluded` (questions already passed) are never chosen;
    /// `Error::NotFound` when the search has no hits or every hit is excluded.
    pub async fn select(
        &self,
        summary: &str,
        page_slug: &str,
        units: &[ContentUnit],
        focus_time: &HashMap<String, f64>,
        excluded: &[String],
    ) -> Result<RemediationCandidate> {
        let scope = [page_slug.to_string()];
        let matches = self
            .search
            .search(summary, &scope, SearchStrategy::LeastSimilar, self.search_threshold, self.candidate_count)
            .await?;

        if matches.is_empty() {
            return Err(Error::NotFound(format!("no chunk matches for page {}", page_slug)));
        }

        let mut best: Option<RemediationCandidate> = None;
        let (mut skipped_excluded, mut skipped_off_page) = (0, 0);
        for hit in &matches {
            if excluded.iter().any(|slug| slug == &hit.slug) {
                debug!(chunk = %hit.slug, "skipping excluded chunk");
                skipped_excluded += 1;
                continue;
            }
            let Some(unit) = units.iter().find(|u| u.slug == hit.slug) else {
                debug!(chunk = %hit.slug, page = page_slug, "search hit outside page content");
                skipped_off_page += 1;
                continue;
            };

            let weight = self.weighter.weight_from(unit, focus_time);
            let candidate = RemediationCandidate {
                unit: unit.clone(),
                weight,
                similarity: hit.score,
                priority: weight * hit.score,
            };
            // Strict comparison keeps the first hit on ties
            if best.as_ref().map_or(true, |b| candidate.priority < b.priority) {
                best = Some(candidate);
            }
        }

        best.ok_or_else(|| {
            Error::NotFound(format!(
                "no eligible chunk for page {}: {} excluded, {} not on the page",
                page_slug, skipped_excluded, skipped_off_page
            ))
        })
    }

    /// Turn a chosen chunk into a generator prompt with a random question type
    pub fn plan<R: Rng + ?Sized>(&self, candidate: &RemediationCandidate, rng: &mut R) -> RemediationPlan {
        let question_type = QuestionType::ALL[rng.gen_range(0..QuestionType::ALL.len())];
        let excerpt = truncate_chars(&candidate.unit.text, self.char_budget);
        let prompt = format!(
            "You are a reading tutor. The student summarized a page but missed part of it.\n\
             Passage:\n{}\n\n\
             {} Ask exactly one short question and do not reveal the answer.",
            excerpt,
            question_type.instruction(),
        );

        RemediationPlan {
            target_chunk: candidate.unit.slug.clone(),
            question_type,
            excerpt,
            prompt,
        }
    }
}

/// Cut text to at most `budget` characters on a char boundary
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::types::SearchMatch;

    /// Search stub returning fixed hits in retrieval order
    struct FixedSearch(Vec<SearchMatch>);

    #[async_trait]
    impl SimilaritySearch for FixedSearch {
        async fn search(
            &self,
            _query: &str,
            _scope: &[String],
            strategy: SearchStrategy,
            _threshold: f64,
            count: usize,
        ) -> Result<Vec<SearchMatch>> {
            assert_eq!(strategy, SearchStrategy::LeastSimilar);
            Ok(self.0.iter().take(count).cloned().collect())
        }
    }

    fn units() -> Vec<ContentUnit> {
        vec![
            ContentUnit::new("intro", "one two three four"),
            ContentUnit::new("markets", "one two three four"),
            ContentUnit::new("policy", "one two three four"),
        ]
    }

    fn selector(hits: Vec<SearchMatch>) -> RemediationSelector {
        RemediationSelector::new(Arc::new(FixedSearch(hits)), ChunkWeighter::new(4.0), 5, 1.0, 20)
    }

    #[tokio::test]
    async fn test_picks_minimum_priority() {
        let selector = selector(vec![
            SearchMatch::new("intro", 0.3),
            SearchMatch::new("markets", 0.1),
            SearchMatch::new("policy", 0.2),
        ]);
        let mut focus = HashMap::new();
        // markets read thoroughly: weight 10 → priority 1.0
        focus.insert("markets".to_string(), 10.0);

        let chosen = selector.select("summary", "page", &units(), &focus, &[]).await.unwrap();
        assert_eq!(chosen.unit.slug, "policy");
        assert!((chosen.priority - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_ties_keep_retrieval_order() {
        let selector = selector(vec![
            SearchMatch::new("markets", 0.2),
            SearchMatch::new("intro", 0.2),
        ]);
        let chosen = selector.select("s", "page", &units(), &HashMap::new(), &[]).await.unwrap();
        assert_eq!(chosen.unit.slug, "markets");
    }

    #[tokio::test]
    async fn test_excluded_chunks_are_skipped() {
        let selector = selector(vec![
            SearchMatch::new("intro", 0.0),
            SearchMatch::new("markets", 0.5),
        ]);
        let excluded = vec!["intro".to_string()];
        let chosen = selector.select("s", "page", &units(), &HashMap::new(), &excluded).await.unwrap();
        assert_eq!(chosen.unit.slug, "markets");
    }

    #[tokio::test]
    async fn test_all_excluded_is_not_found() {
        let selector = selector(vec![
            SearchMatch::new("intro", 0.1),
            SearchMatch::new("markets", 0.2),
        ]);
        let excluded = vec!["intro".to_string(), "markets".to_string()];
        let err = selector.select("s", "page", &units(), &HashMap::new(), &excluded).await.unwrap_err();
        match err {
            Error::NotFound(msg) => assert!(msg.contains("2 excluded, 0 not on the page"), "{}", msg),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hits_outside_the_page_are_not_found() {
        let selector = selector(vec![
            SearchMatch::new("elsewhere", 0.1),
            SearchMatch::new("intro", 0.2),
            SearchMatch::new("appendix", 0.3),
        ]);
        let excluded = vec!["intro".to_string()];
        let err = selector.select("s", "page", &units(), &HashMap::new(), &excluded).await.unwrap_err();
        match err {
            Error::NotFound(msg) => assert!(msg.contains("1 excluded, 2 not on the page"), "{}", msg),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_matches_is_not_found() {
        let selector = selector(vec![]);
        let err = selector.select("s", "page", &units(), &HashMap::new(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_plan_truncates_and_picks_from_taxonomy() {
        let selector = selector(vec![]);
        let candidate = RemediationCandidate {
            unit: ContentUnit::new("long", "é".repeat(50)),
            weight: 1.0,
            similarity: 0.1,
            priority: 0.1,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let plan = selector.plan(&candidate, &mut rng);
        assert_eq!(plan.target_chunk, "long");
        assert_eq!(plan.excerpt.chars().count(), 20);
        assert!(QuestionType::ALL.contains(&plan.question_type));
        assert!(plan.prompt.contains(plan.question_type.instruction()));
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_chars("short", 2000), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
