//! Assessment orchestrator: the summary scoring state machine
//!
//! State transitions:
//! - FETCHED: page chunks and volume metadata retrieved
//! - GATED: containment, dialogue containment, similarity, language and
//!   profanity checks compiled
//! - SHORT_CIRCUITED: any gate failed; content and language are skipped
//! - FULLY_SCORED: model scorers ran against the volume's current threshold
//!
//! Failed summaries whose content or language sub-score failed can be
//! followed by a streamed remediation dialogue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, GatingConfig, PromptConfig};
use crate::core::collaborators::{
    ContentStore, GenerationEvent, Generator, PriorStore, SamplingConfig, Scorers, SimilaritySearch,
};
use crate::core::containment::{containment, tokenize};
use crate::core::estimator::ThresholdEstimator;
use crate::core::feedback::{self, Comparator, FeedbackCompiler};
use crate::core::remediation::{RemediationPlan, RemediationSelector};
use crate::core::weighting::ChunkWeighter;
use crate::types::{
    AnalyticResult, AnswerRequest, AssessmentResult, AssessmentState, ContentUnit, EventType,
    GateReason, RemediationDelta, SearchStrategy, StreamFrame, SummaryRequest,
};
use crate::{Error, Result};

/// The external systems the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentStore>,
    pub search: Arc<dyn SimilaritySearch>,
    pub scorers: Arc<dyn Scorers>,
    pub generator: Arc<dyn Generator>,
    pub priors: Arc<dyn PriorStore>,
}

/// Assessment plus the frames to stream for it
pub struct SummaryStream {
    pub request_id: String,
    pub assessment: AssessmentResult,
    pub remediation: Option<RemediationPlan>,
    /// Assessment frame first, then remediation frames if any
    pub frames: BoxStream<'static, StreamFrame>,
}

pub struct AssessmentOrchestrator {
    content: Arc<dyn ContentStore>,
    search: Arc<dyn SimilaritySearch>,
    scorers: Arc<dyn Scorers>,
    generator: Arc<dyn Generator>,
    estimator: Arc<ThresholdEstimator>,
    compiler: FeedbackCompiler,
    selector: RemediationSelector,
    gating: GatingConfig,
    prompts: PromptConfig,
    sampling: SamplingConfig,
    upstream_timeout: Duration,
}

impl AssessmentOrchestrator {
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let compiler = FeedbackCompiler::new(config.feedback.rules.clone())?;
        for name in [
            feedback::CONTAINMENT,
            feedback::CONTAINMENT_CHAT,
            feedback::SIMILARITY,
            feedback::LANGUAGE_ID,
            feedback::PROFANITY,
            feedback::CONTENT,
            feedback::LANGUAGE,
            feedback::ANSWER,
        ] {
            if compiler.rule(name).is_none() {
                return Err(Error::Config(format!("feedback table lacks a {} rule", name)));
            }
        }
        // Ceiling gates trip only when the score exceeds the ceiling
        for name in [feedback::CONTAINMENT, feedback::CONTAINMENT_CHAT, feedback::SIMILARITY] {
            if matches!(compiler.rule(name), Some(rule) if rule.comparator != Comparator::AtMost) {
                return Err(Error::Config(format!("ceiling rule {} must use the at_most comparator", name)));
            }
        }

        let estimator = Arc::new(ThresholdEstimator::new(
            collaborators.priors.clone(),
            config.estimator.default_prior.clone(),
            config.estimator.target_percentile,
        ));
        let selector = RemediationSelector::new(
            collaborators.search.clone(),
            ChunkWeighter::new(config.remediation.reading_rate),
            config.remediation.candidate_count,
            config.remediation.search_threshold,
            config.remediation.char_budget,
        );

        Ok(Self {
            content: collaborators.content,
            search: collaborators.search,
            scorers: collaborators.scorers,
            generator: collaborators.generator,
            estimator,
            compiler,
            selector,
            gating: config.gating.clone(),
            prompts: config.prompts.clone(),
            sampling: config.remediation.sampling.clone(),
            upstream_timeout: config.server.upstream_timeout(),
        })
    }

    pub fn estimator(&self) -> Arc<ThresholdEstimator> {
        self.estimator.clone()
    }

    /// Score a summary; no remediation
    pub async fn score_summary(&self, req: &SummaryRequest) -> Result<AssessmentResult> {
        self.assess(req).await.map(|(assessment, _)| assessment)
    }

    /// Score a summary and, if it failed on content or language, prepare
    /// the remediation dialogue as a frame stream
    pub async fn stream_summary(&self, req: &SummaryRequest) -> Result<SummaryStream> {
        let (assessment, chunks) = self.assess(req).await?;
        let request_id = Uuid::new_v4().to_string();
        let first = StreamFrame::encode(EventType::Assessment, &assessment)?;

        if !needs_remediation(&assessment) {
            return Ok(SummaryStream {
                request_id,
                assessment,
                remediation: None,
                frames: stream::once(async move { first }).boxed(),
            });
        }

        let candidate = self
            .selector
            .select(&req.summary, &req.page_slug, &chunks, &req.focus_time, &req.excluded_chunks)
            .await?;
        let plan = self.selector.plan(&candidate, &mut rand::thread_rng());
        info!(
            page = %req.page_slug,
            chunk = %plan.target_chunk,
            question_type = %plan.question_type,
            priority = candidate.priority,
            "remediation target selected"
        );

        let tokens = self
            .call("generator", self.generator.generate(&plan.prompt, &self.sampling))
            .await?;

        let rid = request_id.clone();
        let target_chunk = plan.target_chunk.clone();
        let question_type = plan.question_type;
        let remediation = tokens
            .take_while(|event| {
                let keep = match event {
                    Ok(GenerationEvent::Token(_)) => true,
                    Ok(GenerationEvent::EndOfStream) => false,
                    Err(e) => {
                        warn!(error = %e, "generator failed mid-stream; ending response");
                        false
                    }
                };
                futures_util::future::ready(keep)
            })
            .filter_map(move |event| {
                let frame = match event {
                    Ok(GenerationEvent::Token(text)) => {
                        let delta = RemediationDelta {
                            request_id: rid.clone(),
                            text_increment: text,
                            target_chunk: target_chunk.clone(),
                            question_type,
                        };
                        StreamFrame::encode(EventType::Remediation, &delta)
                            .map_err(|e| warn!(error = %e, "dropping unencodable frame"))
                            .ok()
                    }
                    _ => None,
                };
                futures_util::future::ready(frame)
            });

        Ok(SummaryStream {
            request_id,
            assessment,
            remediation: Some(plan),
            frames: stream::once(async move { first }).chain(remediation).boxed(),
        })
    }

    /// Score a constructed response against its chunk's reference answer
    pub async fn score_answer(&self, req: &AnswerRequest) -> Result<AnalyticResult> {
        req.validate()?;
        let chunks = self.call("content", self.content.get_content_units(&req.page_slug)).await?;
        let chunk = chunks
            .iter()
            .find(|c| c.slug == req.chunk_slug)
            .ok_or_else(|| Error::NotFound(format!("chunk {} on page {}", req.chunk_slug, req.page_slug)))?;
        let (Some(question), Some(reference)) = (&chunk.question, &chunk.answer) else {
            return Err(Error::NotFound(format!("question for chunk {}", chunk.slug)));
        };

        let score = self
            .call("answer scorer", self.scorers.score_answer(&req.answer, question, reference))
            .await?;
        let result = self.compiler.compile(feedback::ANSWER, score)?;
        info!(chunk = %chunk.slug, score, passed = ?result.is_passed, "answer scored");
        Ok(result)
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    async fn assess(&self, req: &SummaryRequest) -> Result<(AssessmentResult, Vec<ContentUnit>)> {
        req.validate()?;

        // FETCHED
        let chunks = self.call("content", self.content.get_content_units(&req.page_slug)).await?;
        let volume = self.call("content", self.content.get_volume_metadata(&req.page_slug)).await?;
        if chunks.is_empty() {
            return Err(Error::NotFound(format!("content for page {}", req.page_slug)));
        }
        let source = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
        debug!(page = %req.page_slug, volume = %volume.volume_id, chunks = chunks.len(), state = %AssessmentState::Fetched, "content fetched");

        // GATED
        let (mut sub_results, reasons) = self.gate(req, &source).await?;
        debug!(page = %req.page_slug, state = %AssessmentState::Gated, failed = reasons.len(), "gates compiled");

        if !reasons.is_empty() {
            sub_results.push(self.compiler.skip(feedback::CONTENT)?);
            sub_results.push(self.compiler.skip(feedback::LANGUAGE)?);
            let codes: Vec<&str> = reasons.iter().map(GateReason::code).collect();
            warn!(page = %req.page_slug, reasons = ?codes, "summary short-circuited at gate");
            let result = AssessmentResult::new(
                AssessmentState::ShortCircuited,
                sub_results,
                reasons,
                &self.prompts.pass,
                &self.prompts.fail,
            );
            return Ok((result, chunks));
        }

        // FULLY_SCORED
        let (content_score, language_score) = tokio::try_join!(
            self.call("content scorer", self.scorers.score_content(&req.summary, &source)),
            self.call("language scorer", self.scorers.score_language(&req.summary)),
        )?;
        let threshold = self.estimator.threshold_for(&volume.volume_id).await?;
        sub_results.push(self.compiler.compile_with_threshold(feedback::CONTENT, content_score, threshold)?);
        sub_results.push(self.compiler.compile(feedback::LANGUAGE, language_score)?);

        let result = AssessmentResult::new(
            AssessmentState::FullyScored,
            sub_results,
            Vec::new(),
            &self.prompts.pass,
            &self.prompts.fail,
        );
        info!(
            page = %req.page_slug,
            volume = %volume.volume_id,
            content = content_score,
            threshold,
            passed = result.overall_passed,
            "summary scored"
        );
        Ok((result, chunks))
    }

    /// Cheap checks; returns compiled sub-results and the gates that tripped
    async fn gate(&self, req: &SummaryRequest, source: &str) -> Result<(Vec<AnalyticResult>, Vec<GateReason>)> {
        let ceiling = self.gating.containment_ceiling;
        let scope = [req.page_slug.clone()];
        let tokens = tokenize(&req.summary);

        let (similar, (language, reliable), profane) = tokio::try_join!(
            self.call(
                "similarity search",
                self.search.search(&req.summary, &scope, SearchStrategy::MostSimilar, 0.0, 1),
            ),
            self.call("language detector", self.scorers.detect_language(&req.summary)),
            self.call("profanity filter", self.scorers.contains_profanity(&tokens)),
        )?;

        let similarity = similar.first().map(|m| m.score).unwrap_or(0.0);
        // Unreliable detections do not count against the student
        let in_target_language = !reliable || language == self.gating.target_language;
        let chat_containment = req.chat_history.as_deref().map(|chat| containment(chat, &req.summary));

        let gates = [
            (
                self.compiler.compile_with_threshold(feedback::CONTAINMENT, containment(source, &req.summary), ceiling)?,
                GateReason::G001_CONTAINMENT_CEILING,
            ),
            (
                self.compiler.compile_with_threshold(feedback::CONTAINMENT_CHAT, chat_containment, ceiling)?,
                GateReason::G002_CHAT_CONTAINMENT_CEILING,
            ),
            (
                self.compiler.compile_with_threshold(feedback::SIMILARITY, similarity, self.gating.similarity_ceiling)?,
                GateReason::G003_SIMILARITY_CEILING,
            ),
            (
                self.compiler.compile(feedback::LANGUAGE_ID, in_target_language)?,
                GateReason::G004_WRONG_LANGUAGE,
            ),
            (
                self.compiler.compile(feedback::PROFANITY, profane)?,
                GateReason::G005_PROFANITY,
            ),
        ];

        let reasons = gates
            .iter()
            .filter(|(result, _)| result.is_failed())
            .map(|(_, reason)| *reason)
            .collect();
        let results = gates.into_iter().map(|(result, _)| result).collect();
        Ok((results, reasons))
    }

    /// Await a collaborator call within the upstream budget. No retries.
    async fn call<T>(&self, service: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.upstream_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::UpstreamTimeout {
                service: service.to_string(),
                timeout_ms: self.upstream_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Remediation follows a failed summary whose content or language failed
pub fn needs_remediation(assessment: &AssessmentResult) -> bool {
    !assessment.overall_passed
        && (assessment.is_failing(feedback::CONTENT) || assessment.is_failing(feedback::LANGUAGE))
}
