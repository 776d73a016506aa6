//! Core types for Readcheck

mod prior;
mod analytic;
mod content;
mod frame;
mod state;
mod reason;
mod request;

pub use prior::VolumePrior;
pub use analytic::{RawScore, Evaluation, AnalyticResult, AssessmentResult};
pub use content::{ContentUnit, VolumeMetadata, SearchStrategy, SearchMatch, RemediationCandidate, QuestionType};
pub use frame::{EventType, StreamFrame, RemediationDelta, ParsedFrame};
pub use state::{AssessmentState, StreamState};
pub use reason::GateReason;
pub use request::{SummaryRequest, AnswerRequest, ScoreObservations};
