//! Containment: how much of a derivative text is lifted from a source
//!
//! containment = |source trigrams ∩ derivative trigrams| / |derivative trigrams|
//! over word trigrams with stop-words removed, rounded to 4 decimals.

use std::collections::HashSet;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_WORD: Regex = Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)?").unwrap();

    // =========================================================================
    // English stop-words, excluded from trigrams
    // =========================================================================
    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing",
        "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
        "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
        "i", "if", "in", "into", "is", "it", "it's", "its", "itself", "just", "me", "more",
        "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
        "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
        "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
        "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
        "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
        "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
        "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect();
}

/// Lowercased word tokens, stop-words included
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    RE_WORD
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// True for English function words
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Lowercased tokens with stop-words removed
pub fn content_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect()
}

fn trigrams(text: &str) -> HashSet<[String; 3]> {
    content_words(text)
        .windows(3)
        .map(|w| [w[0].clone(), w[1].clone(), w[2].clone()])
        .collect()
}

/// Fraction of the derivative's trigrams found in the source
///
/// A derivative with no qualifying trigrams counts as fully contained.
pub fn containment(source: &str, derivative: &str) -> f64 {
    let derivative_grams = trigrams(derivative);
    if derivative_grams.is_empty() {
        return 1.0;
    }

    let source_grams = trigrams(source);
    let shared = derivative_grams.intersection(&source_grams).count();
    let ratio = shared as f64 / derivative_grams.len() as f64;
    (ratio * 10_000.0).round() / 10_000.0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "Economics studies how societies allocate scarce resources among \
        competing uses. Markets coordinate decisions through prices, while governments \
        intervene when markets fail to deliver efficient outcomes.";

    #[test]
    fn test_verbatim_copy_is_fully_contained() {
        let c = containment(
            "Economics studies scarcity and choice.",
            "Economics studies scarcity and choice.",
        );
        assert!((c - 1.0).abs() < 1e-9, "got {}", c);
    }

    #[test]
    fn test_verbatim_substring_is_fully_contained() {
        let copied = "Markets coordinate decisions through prices, while governments intervene";
        assert_eq!(containment(SOURCE, copied), 1.0);
    }

    #[test]
    fn test_no_trigrams_counts_as_contained() {
        assert_eq!(containment(SOURCE, "Prices matter."), 1.0);
        assert_eq!(containment(SOURCE, ""), 1.0);
        // Stop-words do not form trigrams
        assert_eq!(containment(SOURCE, "it is what it is and so on"), 1.0);
    }

    #[test]
    fn test_original_wording_has_low_containment() {
        let own_words = "People and firms face tradeoffs because wants exceed available \
            means, so prices signal value and officials step in after breakdowns.";
        let c = containment(SOURCE, own_words);
        assert!(c < 0.2, "got {}", c);
    }

    #[test]
    fn test_containment_is_bounded_and_rounded() {
        let mixed = "Markets coordinate decisions through prices. Students write \
            summaries about wholly unrelated topics like astronomy tonight.";
        let c = containment(SOURCE, mixed);
        assert!((0.0..=1.0).contains(&c));
        assert_eq!(c, (c * 10_000.0).round() / 10_000.0);
    }

    #[test]
    fn test_tokenize_lowercases_and_keeps_contractions() {
        assert_eq!(tokenize("It's Scarcity, choice!"), vec!["it's", "scarcity", "choice"]);
        assert_eq!(content_words("The price of the good"), vec!["price", "good"]);
    }
}
