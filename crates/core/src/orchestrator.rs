//! One question in, one grounded answer out.
//!
//! A query moves through a fixed sequence of stages. Only embedding plus
//! index lookup and generation suspend; everything else is synchronous. A
//! failure at any stage ends in `Failed` and leaves the session untouched.
//! An exchange is committed to the session only after the answer is scored,
//! so dropping the future before then records nothing.

use crate::confidence::{no_answer_sentinel, ConfidencePolicy};
use crate::error::{CollaboratorFailure, PipelineError};
use crate::language;
use crate::memory::{SessionStore, DEFAULT_MAX_HISTORY, DEFAULT_MAX_SESSIONS};
use crate::models::{LanguagePreference, QueryResult};
use crate::normalize::normalize;
use crate::prompt::build_prompt;
use crate::retrieval::{Retrieval, RetrievalConfig, Retriever};
use crate::traits::{Embedder, Generator, VectorIndex};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Received,
    Normalized,
    LanguageDetected,
    ContextBuilt,
    Retrieved,
    Prompted,
    Generated,
    Scored,
    Recorded,
    Done,
    Failed,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStage::Received => "received",
            QueryStage::Normalized => "normalized",
            QueryStage::LanguageDetected => "language_detected",
            QueryStage::ContextBuilt => "context_built",
            QueryStage::Retrieved => "retrieved",
            QueryStage::Prompted => "prompted",
            QueryStage::Generated => "generated",
            QueryStage::Scored => "scored",
            QueryStage::Recorded => "recorded",
            QueryStage::Done => "done",
            QueryStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct StageTracker<'a> {
    session_id: &'a str,
    stage: QueryStage,
}

impl<'a> StageTracker<'a> {
    fn start(session_id: &'a str) -> Self {
        debug!(session_id, stage = %QueryStage::Received, "query stage");
        Self {
            session_id,
            stage: QueryStage::Received,
        }
    }

    fn advance(&mut self, next: QueryStage) {
        debug!(session_id = self.session_id, from = %self.stage, to = %next, "query stage");
        self.stage = next;
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        error!(session_id = self.session_id, at = %self.stage, %error, "query failed");
        self.stage = QueryStage::Failed;
        error
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub confidence: ConfidencePolicy,
    pub generation_timeout: Duration,
    pub max_history: usize,
    pub max_sessions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            confidence: ConfidencePolicy::default(),
            generation_timeout: Duration::from_secs(60),
            max_history: DEFAULT_MAX_HISTORY,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), PipelineError> {
        let threshold = self.retrieval.score_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::Configuration(format!(
                "score threshold {threshold} must be within [0, 1]"
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(PipelineError::Configuration("top_k must be positive".to_string()));
        }
        if self.max_history == 0 {
            return Err(PipelineError::Configuration(
                "max_history must be positive".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(PipelineError::Configuration(
                "max_sessions must be positive".to_string(),
            ));
        }
        if self.confidence.target_sources == 0 {
            return Err(PipelineError::Configuration(
                "target_sources must be positive".to_string(),
            ));
        }
        if self.retrieval.timeout.is_zero() || self.generation_timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "collaborator timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    sessions: SessionStore,
    config: PipelineConfig,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            embedder,
            retriever: Retriever::new(index, config.retrieval.timeout),
            generator,
            sessions: SessionStore::new(config.max_history, config.max_sessions),
            config,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn indexed_chunks(&self) -> Result<usize, PipelineError> {
        self.retriever
            .index()
            .count()
            .await
            .map_err(|error| PipelineError::from_retrieval(error.into()))
    }

    pub async fn ask(
        &self,
        session_id: &str,
        query: &str,
        preference: LanguagePreference,
    ) -> Result<QueryResult, PipelineError> {
        let mut stage = StageTracker::start(session_id);

        let normalized = normalize(query);
        if normalized.is_empty() {
            return Err(stage.fail(PipelineError::EmptyInput));
        }
        stage.advance(QueryStage::Normalized);

        let detected_language = language::resolve(preference, &normalized);
        stage.advance(QueryStage::LanguageDetected);

        // an unknown session has no history; it is created on commit
        let history = match self.sessions.existing(session_id).await {
            Some(session) => session.lock().await.get_context(),
            None => String::new(),
        };
        stage.advance(QueryStage::ContextBuilt);

        let retrieval = &self.config.retrieval;
        let Retrieval { passages, .. } = self
            .retriever
            .retrieve(
                self.embedder.as_ref(),
                &normalized,
                retrieval.top_k,
                retrieval.score_threshold,
            )
            .await
            .map_err(|cause| stage.fail(PipelineError::from_retrieval(cause)))?;
        stage.advance(QueryStage::Retrieved);

        let answer = if passages.is_empty() {
            info!(session_id, "no passage cleared the threshold");
            no_answer_sentinel(detected_language).to_string()
        } else {
            let prompt = build_prompt(&normalized, &passages, &history, detected_language);
            stage.advance(QueryStage::Prompted);

            let timeout = self.config.generation_timeout;
            let generated = tokio::time::timeout(timeout, self.generator.generate(&prompt))
                .await
                .map_err(|_| CollaboratorFailure::Timeout(timeout))
                .and_then(|generated| generated.map_err(CollaboratorFailure::from))
                .map_err(|cause| stage.fail(PipelineError::Generation(cause)))?;
            stage.advance(QueryStage::Generated);
            generated.trim().to_string()
        };

        let confidence = self.config.confidence.estimate(&passages, &answer);
        stage.advance(QueryStage::Scored);

        let session = self.sessions.session(session_id).await;
        session.lock().await.add_exchange(normalized, answer.clone());
        stage.advance(QueryStage::Recorded);

        let source_pages = passages.iter().map(|passage| passage.chunk.page()).collect();
        let result = QueryResult {
            answer,
            passages,
            confidence,
            detected_language,
            source_pages,
            completed_at: Utc::now(),
        };
        stage.advance(QueryStage::Done);
        info!(
            session_id,
            sources = result.num_sources(),
            confidence = result.confidence,
            language = result.detected_language.code(),
            "query answered"
        );
        Ok(result)
    }
}
