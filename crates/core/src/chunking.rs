use crate::error::IngestError;
use crate::models::{Chunk, IngestionOptions, SourceDocument};
use tracing::debug;

/// Split points in priority order. Anything that still does not fit after the
/// last one is cut at character boundaries.
pub const SEPARATORS: &[&str] = &[
    "\n\n", "\n", "। ", "।", ". ", "? ", "! ", "; ", ", ", " ",
];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
            min_chars: value.min_chunk_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        if self.min_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "min_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ChunkedDocument {
    pub chunks: Vec<Chunk>,
    pub dropped_pieces: usize,
}

pub fn chunk_document(
    document: &SourceDocument,
    config: &ChunkingConfig,
) -> Result<ChunkedDocument, IngestError> {
    config.validate()?;

    let mut result = ChunkedDocument::default();
    for page in &document.pages {
        let (chunks, dropped) = chunk_page(&document.source_id, page.number, &page.text, config);
        result.chunks.extend(chunks);
        result.dropped_pieces += dropped;
    }
    Ok(result)
}

/// Chunks one page of already-normalized text. Returns the chunks and the
/// number of pieces dropped for being shorter than `min_chars`.
///
/// Separator leftovers that are only whitespace stay attached to the piece
/// before them (or after them at the start of a page), so stripping the
/// overlaps rebuilds the page exactly. Such whitespace may push a chunk past
/// `max_chars + overlap_chars`.
pub fn chunk_page(
    source_id: &str,
    page: u32,
    text: &str,
    config: &ChunkingConfig,
) -> (Vec<Chunk>, usize) {
    if text.trim().is_empty() {
        return (Vec::new(), 0);
    }

    let mut pieces = Vec::new();
    split_recursive(text, SEPARATORS, config.max_chars, &mut pieces);
    let pieces = absorb_whitespace(text, &pieces);

    let mut dropped = 0;
    let mut chunks: Vec<Chunk> = Vec::new();
    for piece in pieces {
        if char_len(piece.trim()) < config.min_chars {
            debug!(source_id, page, piece_chars = char_len(piece), "dropping short piece");
            dropped += 1;
            continue;
        }

        let content = match chunks.last() {
            Some(previous) if config.overlap_chars > 0 => {
                let mut joined = tail_chars(previous.content(), config.overlap_chars).to_string();
                joined.push_str(piece);
                joined
            }
            _ => piece.to_string(),
        };

        chunks.push(Chunk::new(source_id, page, chunks.len() as u32, content));
    }

    (chunks, dropped)
}

/// Folds whitespace-only pieces into a neighbour. `pieces` must be
/// consecutive slices that tile `text`.
fn absorb_whitespace<'a>(text: &'a str, pieces: &[&'a str]) -> Vec<&'a str> {
    let mut ranges: Vec<(usize, usize)> = Vec::with_capacity(pieces.len());
    let mut offset = 0;
    let mut pending_start = None;
    for piece in pieces {
        let (start, end) = (offset, offset + piece.len());
        offset = end;

        if piece.trim().is_empty() {
            match ranges.last_mut() {
                Some(previous) => previous.1 = end,
                None => {
                    pending_start.get_or_insert(start);
                }
            }
            continue;
        }
        ranges.push((pending_start.take().unwrap_or(start), end));
    }

    ranges.into_iter().map(|(start, end)| &text[start..end]).collect()
}

fn split_recursive<'a>(text: &'a str, separators: &[&str], max_chars: usize, out: &mut Vec<&'a str>) {
    if char_len(text) <= max_chars {
        out.push(text);
        return;
    }

    let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
        split_by_chars(text, max_chars, out);
        return;
    };
    let separator = separators[position];
    let finer = &separators[position + 1..];

    let mut start = 0;
    let mut end = 0;
    let mut current_chars = 0;
    for segment in text.split_inclusive(separator) {
        let segment_chars = char_len(segment);
        if end > start && current_chars + segment_chars > max_chars {
            emit_piece(&text[start..end], finer, max_chars, out);
            start = end;
            current_chars = 0;
        }
        end += segment.len();
        current_chars += segment_chars;
    }
    if end > start {
        emit_piece(&text[start..end], finer, max_chars, out);
    }
}

fn emit_piece<'a>(piece: &'a str, finer: &[&str], max_chars: usize, out: &mut Vec<&'a str>) {
    if char_len(piece) <= max_chars {
        out.push(piece);
    } else {
        split_recursive(piece, finer, max_chars, out);
    }
}

fn split_by_chars<'a>(text: &'a str, max_chars: usize, out: &mut Vec<&'a str>) {
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == max_chars {
            out.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
}

fn tail_chars(text: &str, count: usize) -> &str {
    let total = char_len(text);
    if total <= count {
        return text;
    }
    let skip = total - count;
    let offset = text
        .char_indices()
        .nth(skip)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    &text[offset..]
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageText;

    fn config(max_chars: usize, overlap_chars: usize, min_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
            min_chars,
        }
    }

    fn strip_overlaps(chunks: &[Chunk], overlap: usize) -> String {
        let mut rebuilt = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if index == 0 {
                rebuilt.push_str(chunk.content());
                continue;
            }
            let prefix = overlap.min(chunks[index - 1].char_length());
            rebuilt.extend(chunk.content().chars().skip(prefix));
        }
        rebuilt
    }

    fn narrative() -> String {
        let sentences = [
            "অনুপম তার মামার কথায় চলত। ",
            "বিয়ের কথাবার্তা পাকা হয়েছিল কল্যাণীর বাবার সঙ্গে। ",
            "শম্ভুনাথ বাবু শান্ত মানুষ, কিন্তু তিনি অপমান সহ্য করলেন না। ",
            "The wedding was called off at the last moment. ",
            "Years later Anupam met Kalyani again on a train. ",
        ];
        let paragraph: String = sentences.concat();
        [paragraph.clone(), paragraph.clone(), paragraph].join("\n\n")
    }

    #[test]
    fn short_page_yields_single_chunk() {
        let text = "অনুপম কল্যাণীকে ট্রেনে দেখেছিল। সে তখন মেয়েদের পড়াচ্ছিল।";
        let (chunks, dropped) = chunk_page("book", 4, text, &config(1000, 100, 10));
        assert_eq!(dropped, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content(), text);
        assert_eq!(chunks[0].page(), 4);
        assert_eq!(chunks[0].chunk_index(), 0);
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let (chunks, dropped) = chunk_page("book", 1, "   ", &config(100, 10, 5));
        assert!(chunks.is_empty());
        assert_eq!(dropped, 0);
    }

    #[test]
    fn chunks_respect_size_plus_overlap() {
        let text = narrative();
        let (chunks, _) = chunk_page("book", 1, &text, &config(120, 20, 5));
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            let visible = chunk.content().trim().chars().count();
            assert!(visible <= 120 + 20, "chunk too long: {visible}");
            assert_eq!(chunk.char_length(), chunk.content().chars().count());
        }
    }

    #[test]
    fn stripping_overlaps_rebuilds_the_page() {
        let text = narrative();
        let (chunks, dropped) = chunk_page("book", 1, &text, &config(150, 30, 5));
        assert_eq!(dropped, 0);
        assert_eq!(strip_overlaps(&chunks, 30), text);
    }

    #[test]
    fn paragraph_break_survives_a_split() {
        let text = "aaaa bbbb\n\ncccc dddd";
        let (chunks, dropped) = chunk_page("book", 1, text, &config(10, 0, 1));
        assert_eq!(dropped, 0);
        let contents: Vec<&str> = chunks.iter().map(Chunk::content).collect();
        assert_eq!(contents, vec!["aaaa bbbb\n\n", "cccc dddd"]);
        assert_eq!(strip_overlaps(&chunks, 0), text);
    }

    #[test]
    fn leading_whitespace_joins_the_first_piece() {
        let pieces = ["\n", "abc ", " ", "def"];
        let text = pieces.concat();
        assert_eq!(absorb_whitespace(&text, &pieces), vec!["\nabc  ", "def"]);
    }

    #[test]
    fn overlapping_chunks_rebuild_text_with_line_breaks() {
        let text = "প্রথম লাইন এখানে\nদ্বিতীয় লাইন\n\nতৃতীয় অনুচ্ছেদ শুরু হলো।\n\nশেষ";
        let (chunks, dropped) = chunk_page("book", 2, text, &config(16, 4, 1));
        assert_eq!(dropped, 0);
        assert!(chunks.len() > 2);
        assert_eq!(strip_overlaps(&chunks, 4), text);
    }

    #[test]
    fn indices_are_contiguous_per_page() {
        let text = narrative();
        let document = SourceDocument {
            source_id: "book".to_string(),
            pages: vec![
                PageText {
                    number: 1,
                    text: text.clone(),
                },
                PageText { number: 2, text },
            ],
        };
        let result = chunk_document(&document, &config(100, 10, 5)).expect("valid config");
        for page in [1, 2] {
            let indices: Vec<u32> = result
                .chunks
                .iter()
                .filter(|chunk| chunk.page() == page)
                .map(Chunk::chunk_index)
                .collect();
            let expected: Vec<u32> = (0..indices.len() as u32).collect();
            assert_eq!(indices, expected);
        }
    }

    #[test]
    fn splits_prefer_sentence_ends_over_words() {
        let text = "প্রথম বাক্যটি এখানে শেষ হলো। দ্বিতীয় বাক্যটিও এখানে শেষ হলো।";
        let (chunks, _) = chunk_page("book", 1, text, &config(40, 0, 5));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content(), "প্রথম বাক্যটি এখানে শেষ হলো। ");
        assert_eq!(chunks[1].content(), "দ্বিতীয় বাক্যটিও এখানে শেষ হলো।");
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let text = "aaaa bbbb cccc dddd";
        let (chunks, _) = chunk_page("book", 1, text, &config(10, 3, 1));
        assert_eq!(chunks[0].content(), "aaaa bbbb ");
        assert_eq!(chunks[1].content(), "bb cccc dddd");
    }

    #[test]
    fn unbroken_text_is_cut_at_characters() {
        let text = "x".repeat(25);
        let (chunks, dropped) = chunk_page("book", 1, &text, &config(10, 0, 1));
        assert_eq!(dropped, 0);
        let lengths: Vec<usize> = chunks.iter().map(Chunk::char_length).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn short_pieces_are_dropped_and_counted() {
        let text = format!("{}\n\nok", "long paragraph text ".repeat(3));
        let (chunks, dropped) = chunk_page("book", 1, &text, &config(61, 0, 10));
        assert_eq!(chunks.len(), 1);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let document = SourceDocument {
            source_id: "book".to_string(),
            pages: Vec::new(),
        };
        assert!(chunk_document(&document, &config(10, 10, 1)).is_err());
        assert!(chunk_document(&document, &config(10, 0, 0)).is_err());
    }
}
