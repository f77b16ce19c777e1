use crate::confidence::{BENGALI_NO_ANSWER, ENGLISH_NO_ANSWER};
use crate::models::{Language, RetrievedPassage};

const INSTRUCTIONS: &str = "নিচে দেওয়া প্রসঙ্গ (context) এর উপর ভিত্তি করে প্রশ্নের উত্তর দাও।

গুরুত্বপূর্ণ নির্দেশাবলী:
1. শুধুমাত্র প্রদত্ত প্রসঙ্গের তথ্য ব্যবহার করো
2. যদি প্রসঙ্গে উত্তর না থাকে, তাহলে ঠিক এই বাক্যটি লেখো: ";

const RULES_TAIL: &str = "
3. উত্তর সংক্ষিপ্ত এবং সুনির্দিষ্ট হতে হবে
4. প্রশ্নের ভাষায় উত্তর দাও (বাংলা প্রশ্নের বাংলা উত্তর, ইংরেজি প্রশ্নের ইংরেজি উত্তর)";

/// Renders the single-shot generation prompt. `history` is the conversation
/// preamble from memory and may be empty.
pub fn build_prompt(
    question: &str,
    passages: &[RetrievedPassage],
    history: &str,
    language: Language,
) -> String {
    let refusal = match language {
        Language::Bengali => BENGALI_NO_ANSWER,
        Language::English => ENGLISH_NO_ANSWER,
    };

    let mut prompt = String::with_capacity(1024);
    prompt.push_str(INSTRUCTIONS);
    prompt.push('"');
    prompt.push_str(refusal);
    prompt.push('"');
    prompt.push_str(RULES_TAIL);

    prompt.push_str("\n\nপ্রসঙ্গ (Context):\n");
    for (position, passage) in passages.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] (পৃষ্ঠা {}) {}\n",
            position + 1,
            passage.chunk.page(),
            passage.chunk.content()
        ));
    }

    if !history.is_empty() {
        prompt.push('\n');
        prompt.push_str(history);
        prompt.push_str("Current question: ");
    } else {
        prompt.push_str("\nপ্রশ্ন: ");
    }
    prompt.push_str(question);
    prompt.push_str("\n\nউত্তর:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Chunk;

    fn passage(page: u32, text: &str) -> RetrievedPassage {
        RetrievedPassage {
            chunk: Chunk::new("book.pdf", page, 0, text),
            score: 0.8,
        }
    }

    #[test]
    fn passages_are_numbered_with_pages() {
        let prompt = build_prompt(
            "অনুপমের মামা কে?",
            &[passage(3, "প্রথম অংশ"), passage(9, "দ্বিতীয় অংশ")],
            "",
            Language::Bengali,
        );
        assert!(prompt.contains("[1] (পৃষ্ঠা 3) প্রথম অংশ"));
        assert!(prompt.contains("[2] (পৃষ্ঠা 9) দ্বিতীয় অংশ"));
        assert!(prompt.contains("প্রশ্ন: অনুপমের মামা কে?"));
        assert!(prompt.ends_with("উত্তর:"));
    }

    #[test]
    fn refusal_phrase_follows_language() {
        let english = build_prompt("Who?", &[], "", Language::English);
        assert!(english.contains(ENGLISH_NO_ANSWER));
        let bengali = build_prompt("কে?", &[], "", Language::Bengali);
        assert!(bengali.contains(BENGALI_NO_ANSWER));
    }

    #[test]
    fn history_precedes_current_question() {
        let history = "Previous conversation:\nQ: q1\nA: a1\n\n";
        let prompt = build_prompt("q2", &[passage(1, "x")], history, Language::English);
        let history_at = prompt.find("Q: q1").unwrap_or(usize::MAX);
        let question_at = prompt.find("Current question: q2").unwrap_or(0);
        assert!(history_at < question_at);
    }
}
