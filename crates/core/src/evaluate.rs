//! Offline retrieval quality checks against question/answer pairs.

use crate::embeddings::cosine_similarity;
use crate::error::{CollaboratorFailure, PipelineError};
use crate::normalize::normalize;
use crate::retrieval::{Retrieval, Retriever};
use crate::traits::{Embedder, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
    pub expected_answer: String,
}

impl EvalCase {
    pub fn new(question: &str, expected_answer: &str) -> Self {
        Self {
            question: question.to_string(),
            expected_answer: expected_answer.to_string(),
        }
    }
}

/// Reference questions about the bundled story.
pub fn default_cases() -> Vec<EvalCase> {
    vec![
        EvalCase::new("অনুপমের ভাষায় সুপুরুষ কাকে বলা হয়েছে?", "শুম্ভুনাথ"),
        EvalCase::new("কাকে অনুপমের ভাগ্য দেবতা বলে উল্লেখ করা হয়েছে?", "মামাকে"),
        EvalCase::new("বিয়ের সময় কল্যাণীর প্রকৃত বয়স কত ছিল?", "১৫ বছর"),
        EvalCase::new("Who is described as a good man according to Anupam?", "Shumbhunath"),
        EvalCase::new("What was Kalyani's actual age at the time of marriage?", "15 years"),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub question: String,
    pub expected_answer: String,
    pub relevance_score: f32,
    pub groundedness_score: f32,
    pub exact_match: bool,
    pub retrieved_docs_count: usize,
    pub retrieved_context_preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub total_cases: usize,
    pub avg_relevance: f32,
    pub avg_groundedness: f32,
    pub exact_match_accuracy: f32,
    pub case_results: Vec<CaseResult>,
}

/// Mean cosine similarity between the query and each retrieved passage.
pub fn relevance(query: &[f32], passages: &[Vec<f32>]) -> f32 {
    if passages.is_empty() {
        return 0.0;
    }
    let total: f32 = passages
        .iter()
        .map(|passage| cosine_similarity(query, passage))
        .sum();
    total / passages.len() as f32
}

/// Share of the answer's distinct words that also occur in the context.
pub fn groundedness(answer: &str, context: &[String]) -> f32 {
    let answer = normalize(answer).to_lowercase();
    let answer_words: HashSet<&str> = answer.split_whitespace().collect();
    if answer_words.is_empty() || context.is_empty() {
        return 0.0;
    }

    let context = normalize(&context.join(" ")).to_lowercase();
    let context_words: HashSet<&str> = context.split_whitespace().collect();
    let overlap = answer_words.intersection(&context_words).count();
    overlap as f32 / answer_words.len() as f32
}

pub fn exact_match(answer: &str, context: &[String]) -> bool {
    let answer = normalize(answer).to_lowercase();
    !answer.is_empty() && normalize(&context.join(" ")).to_lowercase().contains(&answer)
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

pub struct Evaluator {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    top_k: usize,
}

impl Evaluator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            retriever: Retriever::new(index, timeout),
            top_k,
        }
    }

    /// Scores retrieval only; no answers are generated. Every passage the
    /// index returns is considered, regardless of the serving threshold.
    pub async fn evaluate(&self, cases: &[EvalCase]) -> Result<EvaluationReport, PipelineError> {
        let mut case_results = Vec::with_capacity(cases.len());

        for (position, case) in cases.iter().enumerate() {
            info!(case = position + 1, question = %case.question, "evaluating");
            let query = normalize(&case.question);
            let Retrieval {
                query_embedding,
                passages,
            } = self
                .retriever
                .retrieve(self.embedder.as_ref(), &query, self.top_k, 0.0)
                .await
                .map_err(PipelineError::from_retrieval)?;

            let texts: Vec<String> = passages
                .iter()
                .map(|passage| passage.chunk.content().to_string())
                .collect();
            let passage_embeddings = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|error| PipelineError::from_retrieval(CollaboratorFailure::from(error)))?;

            case_results.push(CaseResult {
                question: case.question.clone(),
                expected_answer: case.expected_answer.clone(),
                relevance_score: relevance(&query_embedding, &passage_embeddings),
                groundedness_score: groundedness(&case.expected_answer, &texts),
                exact_match: exact_match(&case.expected_answer, &texts),
                retrieved_docs_count: texts.len(),
                retrieved_context_preview: texts
                    .first()
                    .map(|text| text.chars().take(PREVIEW_CHARS).collect())
                    .unwrap_or_default(),
            });
        }

        Ok(EvaluationReport {
            total_cases: case_results.len(),
            avg_relevance: mean(case_results.iter().map(|case| case.relevance_score)),
            avg_groundedness: mean(case_results.iter().map(|case| case.groundedness_score)),
            exact_match_accuracy: mean(
                case_results
                    .iter()
                    .map(|case| if case.exact_match { 1.0 } else { 0.0 }),
            ),
            case_results,
        })
    }
}
