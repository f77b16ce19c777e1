use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous slice of one page of one source document.
///
/// Fields are private so `char_length` always matches `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ChunkRecord")]
pub struct Chunk {
    content: String,
    source_id: String,
    page: u32,
    chunk_index: u32,
    char_length: usize,
}

#[derive(Deserialize)]
struct ChunkRecord {
    content: String,
    source_id: String,
    page: u32,
    chunk_index: u32,
}

impl From<ChunkRecord> for Chunk {
    fn from(record: ChunkRecord) -> Self {
        Chunk::new(record.source_id, record.page, record.chunk_index, record.content)
    }
}

impl Chunk {
    /// Pages are 1-based; page 0 is clamped to 1.
    pub fn new(
        source_id: impl Into<String>,
        page: u32,
        chunk_index: u32,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let char_length = content.chars().count();
        Self {
            content,
            source_id: source_id.into(),
            page: page.max(1),
            chunk_index,
            char_length,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    pub fn char_length(&self) -> usize {
        self.char_length
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "bn")]
    Bengali,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Bengali => "bn",
            Language::English => "en",
        }
    }
}

/// What the caller asked for: a fixed language, or detection from the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguagePreference {
    #[default]
    Auto,
    #[serde(alias = "bn")]
    Primary,
    #[serde(alias = "en")]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub passages: Vec<RetrievedPassage>,
    pub confidence: f32,
    pub detected_language: Language,
    pub source_pages: Vec<u32>,
    pub completed_at: DateTime<Utc>,
}

impl QueryResult {
    pub fn num_sources(&self) -> usize {
        self.passages.len()
    }

    pub fn context_chunks(&self) -> Vec<String> {
        self.passages
            .iter()
            .map(|passage| passage.chunk.content().to_string())
            .collect()
    }
}

/// One page of extracted source text before normalization.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_id: String,
    pub pages: Vec<PageText>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub min_chunk_chars: usize,
    pub min_page_chars: usize,
    pub filter_question_pages: bool,
    pub embed_batch_size: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 100,
            min_chunk_chars: 30,
            min_page_chars: 50,
            filter_question_pages: true,
            embed_batch_size: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_length_counts_characters_not_bytes() {
        let chunk = Chunk::new("book.pdf", 3, 0, "অনুপম");
        assert_eq!(chunk.char_length(), 5);
        assert!(chunk.content().len() > 5);
    }

    #[test]
    fn deserialized_chunk_recomputes_length() {
        let raw = r#"{"content":"abc","source_id":"s","page":0,"chunk_index":2,"char_length":99}"#;
        let chunk: Chunk = serde_json::from_str(raw).expect("chunk should parse");
        assert_eq!(chunk.char_length(), 3);
        assert_eq!(chunk.page(), 1);
    }

    #[test]
    fn language_preference_accepts_codes_and_roles() {
        let parsed: Vec<LanguagePreference> =
            serde_json::from_str(r#"["auto","primary","bn","other","en"]"#)
                .expect("preferences should parse");
        assert_eq!(
            parsed,
            vec![
                LanguagePreference::Auto,
                LanguagePreference::Primary,
                LanguagePreference::Primary,
                LanguagePreference::Other,
                LanguagePreference::Other,
            ]
        );
    }
}
