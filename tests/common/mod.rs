//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use readcheck::core::{
    AssessmentOrchestrator, Collaborators, Generator, LexicalScorers, LexicalSearch, MemoryContentStore,
    MemoryPriorStore, PageRecord, ScriptedGenerator,
};
use readcheck::types::{ContentUnit, VolumeMetadata, VolumePrior};
use readcheck::Config;

pub const PAGE: &str = "scarcity-and-markets";
pub const VOLUME: &str = "econ-101";

/// Restates the page in new words; clears every gate
pub const OWN_WORDS: &str = "When resources are limited, people must give something up for each decision \
     they make, and the prices set in markets tell buyers and sellers how scarce things are.";

/// Original but too thin to pass the wording score
pub const TERSE: &str = "Prices guide buyers and sellers.";

pub const REMEDIATION_SCRIPT: &str = "Why do you think choices carry a cost?";

pub fn economics_page() -> PageRecord {
    PageRecord {
        slug: PAGE.to_string(),
        volume: VolumeMetadata {
            volume_id: VOLUME.to_string(),
            title: "Principles of Economics".to_string(),
            description: "An introductory economics text".to_string(),
        },
        chunks: vec![
            ContentUnit::new(
                "scarcity",
                "Scarcity means people cannot have everything they want, so every choice carries an opportunity cost.",
            )
            .with_question(
                "What is an opportunity cost?",
                "The value of the next best alternative given up when making a choice.",
            ),
            ContentUnit::new(
                "markets",
                "Markets coordinate buyers and sellers through prices that rise when goods are scarce and fall when they are plentiful.",
            ),
            ContentUnit::new(
                "policy",
                "Governments tax, spend and regulate industries to correct market failures such as pollution.",
            ),
        ],
    }
}

/// The markets chunk, copied word for word
pub fn copied_summary() -> String {
    economics_page().chunks[1].text.clone()
}

pub fn collaborators_with(generator: Arc<dyn Generator>) -> Collaborators {
    let content = Arc::new(MemoryContentStore::from_pages(vec![economics_page()]));
    Collaborators {
        content: content.clone(),
        search: Arc::new(LexicalSearch::new(content)),
        scorers: Arc::new(LexicalScorers::new()),
        generator,
        priors: Arc::new(MemoryPriorStore::new()),
    }
}

pub fn collaborators() -> Collaborators {
    collaborators_with(Arc::new(ScriptedGenerator::new(REMEDIATION_SCRIPT)))
}

pub fn orchestrator(config: &Config) -> AssessmentOrchestrator {
    AssessmentOrchestrator::new(config, collaborators()).unwrap()
}

/// Default prior expecting near-perfect content scores with little spread
pub fn strict_config() -> Config {
    let mut config = Config::default();
    config.estimator.default_prior = VolumePrior::new(0.9, 10.0, 2.0, 0.001);
    config
}
