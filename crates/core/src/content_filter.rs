//! Page-level cleanup and classification ahead of chunking.
//!
//! Textbook PDFs interleave the narrative with multiple-choice exercises and
//! running headers. Exercise pages retrieve well on keywords but never answer
//! a question about the story, so they are kept out of the index.

use crate::error::IngestError;
use regex::Regex;

/// Marks an answer option list.
pub const OPTION_MARKER: &str = "(ক)";

pub const QUESTION_MARKERS: &[&str] = &[
    "প্রশ্ন",
    "উত্তর:",
    "(খ)",
    "(গ)",
    "(ঘ)",
    "সঠিক",
    "ভুল",
    "নিচের কোনটি",
    "কোন সালে",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Narrative,
    QuestionList,
    TooShort,
}

impl PageKind {
    pub fn is_indexed(self) -> bool {
        matches!(self, PageKind::Narrative)
    }
}

pub struct PageCleaner {
    bengali_page_label: Regex,
    english_page_label: Regex,
    lone_number_line: Regex,
    blank_run: Regex,
}

impl PageCleaner {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            bengali_page_label: Regex::new(r"পৃষ্ঠা\s*[0-9০-৯]+")?,
            english_page_label: Regex::new(r"(?i)\bpage\s*[0-9]+")?,
            lone_number_line: Regex::new(r"(?m)^[ \t]*[0-9০-৯]+[ \t]*$")?,
            blank_run: Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+")?,
        })
    }

    /// Removes page labels and bare page-number lines, then collapses runs of
    /// blank lines to one paragraph break.
    pub fn strip_furniture(&self, text: &str) -> String {
        let text = self.bengali_page_label.replace_all(text, "");
        let text = self.english_page_label.replace_all(&text, "");
        let text = self.lone_number_line.replace_all(&text, "");
        self.blank_run.replace_all(&text, "\n\n").trim().to_string()
    }
}

pub fn classify_page(text: &str, min_page_chars: usize) -> PageKind {
    if text.trim().chars().count() < min_page_chars {
        return PageKind::TooShort;
    }

    let has_options = text.contains(OPTION_MARKER);
    let has_questions = QUESTION_MARKERS.iter().any(|marker| text.contains(marker));
    if has_options && has_questions {
        return PageKind::QuestionList;
    }

    PageKind::Narrative
}

#[cfg(test)]
mod tests {
    use super::*;

    const NARRATIVE: &str = "আজ আমার বয়স সাতাশ মাত্র। এ জীবনটা না দৈর্ঘ্যের হিসাবে বড়, না গুণের হিসাবে।";

    #[test]
    fn page_labels_and_numbers_are_removed() -> Result<(), IngestError> {
        let cleaner = PageCleaner::new()?;
        let raw = "পৃষ্ঠা ১২\nঅনুপম স্টেশনে নামল।\n\n\n\n১২\nPage 7 of the book";
        let cleaned = cleaner.strip_furniture(raw);
        assert!(!cleaned.contains("পৃষ্ঠা"));
        assert!(!cleaned.contains("১২"));
        assert!(!cleaned.contains("Page 7"));
        assert!(cleaned.contains("অনুপম স্টেশনে নামল।"));
        assert!(!cleaned.contains("\n\n\n"));
        Ok(())
    }

    #[test]
    fn numbers_inside_sentences_survive() -> Result<(), IngestError> {
        let cleaner = PageCleaner::new()?;
        let cleaned = cleaner.strip_furniture("কল্যাণীর বয়স ১৫ বছর।");
        assert_eq!(cleaned, "কল্যাণীর বয়স ১৫ বছর।");
        Ok(())
    }

    #[test]
    fn narrative_pages_are_indexed() {
        assert_eq!(classify_page(NARRATIVE, 50), PageKind::Narrative);
        assert!(classify_page(NARRATIVE, 50).is_indexed());
    }

    #[test]
    fn option_lists_with_questions_are_skipped() {
        let page = "১। অনুপমের বয়স কত? (ক) ২৫ (খ) ২৬ (গ) ২৭ (ঘ) ২৮ সঠিক উত্তর লেখো।";
        assert_eq!(classify_page(page, 10), PageKind::QuestionList);
    }

    #[test]
    fn option_marker_alone_is_not_enough() {
        let page = format!("{NARRATIVE} (ক) চিহ্নিত অংশটি দেখো।");
        assert_eq!(classify_page(&page, 50), PageKind::Narrative);
    }

    #[test]
    fn short_pages_are_skipped() {
        assert_eq!(classify_page("  সূচিপত্র  ", 50), PageKind::TooShort);
        assert!(!PageKind::TooShort.is_indexed());
    }
}
