//! Answer confidence.
//!
//! The score is a heuristic, not a calibrated probability: it grows with the
//! number of passages that cleared the retrieval threshold and is cut down when
//! the model answered with a refusal. Treat it as a ranking signal only.

use crate::models::{Language, RetrievedPassage};
use crate::normalize::normalize;

pub const BENGALI_NO_ANSWER: &str = "তথ্যে এই উত্তর পাওয়া যায়নি";
pub const ENGLISH_NO_ANSWER: &str = "The answer was not found in the provided text.";

/// Phrases the prompt tells the model to use when the context is insufficient.
const REFUSALS: [&str; 3] = [BENGALI_NO_ANSWER, ENGLISH_NO_ANSWER, "আমি নিশ্চিত নই"];

pub fn no_answer_sentinel(language: Language) -> &'static str {
    match language {
        Language::Bengali => BENGALI_NO_ANSWER,
        Language::English => ENGLISH_NO_ANSWER,
    }
}

pub fn is_no_answer(answer: &str) -> bool {
    let answer = normalize(answer);
    let answer = answer.trim_end_matches(is_terminal).trim_end();
    REFUSALS
        .iter()
        .any(|refusal| normalize(refusal).trim_end_matches(is_terminal) == answer)
}

fn is_terminal(ch: char) -> bool {
    ch == '।' || ch == '.'
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidencePolicy {
    /// Passage count at which the coverage term saturates.
    pub target_sources: usize,
    /// Multiplier applied when the answer is a refusal, in `[0, 1]`.
    pub no_answer_factor: f32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            target_sources: 5,
            no_answer_factor: 0.2,
        }
    }
}

impl ConfidencePolicy {
    pub fn estimate(&self, passages: &[RetrievedPassage], answer: &str) -> f32 {
        if passages.is_empty() {
            return 0.0;
        }

        let target = self.target_sources.max(1) as f32;
        let coverage = (passages.len() as f32 / target).min(1.0);
        let factor = if is_no_answer(answer) {
            self.no_answer_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };

        (coverage * factor).clamp(0.0, 1.0)
    }
}
