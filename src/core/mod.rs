//! Core modules for Readcheck

pub mod api;
pub mod collaborators;
pub mod containment;
pub mod estimator;
pub mod feedback;
pub mod framer;
pub mod local;
pub mod orchestrator;
pub mod remediation;
pub mod weighting;

pub use api::{create_router, run_server, AppState};
pub use collaborators::{
    ContentStore, GenerationEvent, Generator, PriorStore, SamplingConfig, Scorers, SimilaritySearch, TokenStream,
};
pub use containment::{containment, tokenize};
pub use estimator::ThresholdEstimator;
pub use feedback::{Comparator, FeedbackCompiler, FeedbackRule};
pub use framer::{log_completion, parse_frame, StreamFramer, StreamLog};
pub use local::{LexicalScorers, LexicalSearch, MemoryContentStore, MemoryPriorStore, PageRecord, ScriptedGenerator};
pub use orchestrator::{AssessmentOrchestrator, Collaborators, SummaryStream};
pub use remediation::{RemediationPlan, RemediationSelector};
pub use weighting::ChunkWeighter;
