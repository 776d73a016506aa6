//! Chunk weighter: reading focus time → re-reading weight
//!
//! weight = focus_time / expected_time, expected_time = words / reading_rate.
//! Below 1.0 the student spent less time on the chunk than a normal read
//! needs. Unobserved focus time is floored at one time unit.

use std::collections::HashMap;

use crate::types::ContentUnit;

#[derive(Debug, Clone, Copy)]
pub struct ChunkWeighter {
    /// Words read per unit of focus time
    reading_rate: f64,
}

impl Default for ChunkWeighter {
    fn default() -> Self {
        Self::new(crate::READING_RATE)
    }
}

impl ChunkWeighter {
    pub fn new(reading_rate: f64) -> Self {
        Self { reading_rate }
    }

    pub fn weight(&self, unit: &ContentUnit, focus_time: Option<f64>) -> f64 {
        let time = focus_time.unwrap_or(0.0).max(1.0);
        let words = unit.word_count().max(1) as f64;
        time * self.reading_rate / words
    }

    /// Weight of a chunk using a focus-time table keyed by slug
    pub fn weight_from(&self, unit: &ContentUnit, focus_time: &HashMap<String, f64>) -> f64 {
        self.weight(unit, focus_time.get(&unit.slug).copied())
    }
}
