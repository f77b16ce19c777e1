use crate::chunking::{chunk_document, ChunkingConfig};
use crate::content_filter::{classify_page, PageCleaner, PageKind};
use crate::extractor::{extract_document, SourceKind};
use crate::models::{Chunk, IngestionOptions, PageText, SourceDocument};
use crate::normalize::normalize_document;
use crate::traits::{Embedder, VectorIndex};
use crate::IngestError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Supported source files under `folder`, recursively, in sorted order.
pub fn discover_source_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if SourceKind::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub path: PathBuf,
    pub checksum: String,
    pub pages: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub source_id: String,
    pub page: u32,
    pub kind: PageKind,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub chunks: Vec<Chunk>,
    pub files: Vec<IngestedFile>,
    pub skipped_files: Vec<SkippedFile>,
    pub skipped_pages: Vec<SkippedPage>,
    pub dropped_chunks: usize,
}

impl IngestionReport {
    fn log_summary(&self) {
        info!(
            files = self.files.len(),
            chunks = self.chunks.len(),
            "ingestion finished"
        );
        if !self.skipped_files.is_empty() {
            warn!(count = self.skipped_files.len(), "source files skipped");
        }
        if !self.skipped_pages.is_empty() {
            warn!(count = self.skipped_pages.len(), "pages skipped by content filter");
        }
        if self.dropped_chunks > 0 {
            warn!(count = self.dropped_chunks, "pieces below minimum chunk size dropped");
        }
    }
}

/// Cleans, normalizes and filters the pages of one document, then chunks
/// whatever survives. Skipped pages are appended to `skipped`.
pub fn prepare_document(
    document: &SourceDocument,
    cleaner: &PageCleaner,
    options: &IngestionOptions,
    skipped: &mut Vec<SkippedPage>,
) -> Result<(Vec<Chunk>, usize), IngestError> {
    let mut kept = Vec::with_capacity(document.pages.len());

    for page in &document.pages {
        let text = normalize_document(&cleaner.strip_furniture(&page.text));
        let kind = classify_page(&text, options.min_page_chars);

        let indexed = match kind {
            PageKind::QuestionList => !options.filter_question_pages,
            other => other.is_indexed(),
        };
        if !indexed {
            warn!(source_id = %document.source_id, page = page.number, ?kind, "page skipped");
            skipped.push(SkippedPage {
                source_id: document.source_id.clone(),
                page: page.number,
                kind,
            });
            continue;
        }

        kept.push(PageText {
            number: page.number,
            text,
        });
    }

    let cleaned = SourceDocument {
        source_id: document.source_id.clone(),
        pages: kept,
    };
    let chunked = chunk_document(&cleaned, &ChunkingConfig::from(options))?;
    Ok((chunked.chunks, chunked.dropped_pieces))
}

/// Chunks every supported file under `folder`. Files that fail to load are
/// recorded and skipped; a folder with no supported files at all is an error.
pub fn collect_chunks(folder: &Path, options: &IngestionOptions) -> Result<IngestionReport, IngestError> {
    ChunkingConfig::from(options).validate()?;

    let files = discover_source_files(folder);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf, txt or md files found in {}",
            folder.display()
        )));
    }

    let cleaner = PageCleaner::new()?;
    let mut report = IngestionReport::default();

    for path in files {
        let outcome = (|| {
            let checksum = digest_file(&path)?;
            let document = extract_document(&path)?;
            let (chunks, dropped) =
                prepare_document(&document, &cleaner, options, &mut report.skipped_pages)?;
            Ok::<_, IngestError>((checksum, document.pages.len(), chunks, dropped))
        })();

        match outcome {
            Ok((checksum, pages, chunks, dropped)) => {
                info!(path = %path.display(), pages, chunks = chunks.len(), "source chunked");
                report.files.push(IngestedFile {
                    path,
                    checksum,
                    pages,
                    chunks: chunks.len(),
                });
                report.chunks.extend(chunks);
                report.dropped_chunks += dropped;
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping source file");
                report.skipped_files.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Full ingestion: chunk the folder, embed in batches and swap the index
/// content in one `replace`. Nothing is written unless every batch embeds.
pub async fn ingest_folder(
    folder: &Path,
    options: &IngestionOptions,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
) -> Result<IngestionReport, IngestError> {
    let report = collect_chunks(folder, options)?;
    if report.chunks.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no indexable content found in {}",
            folder.display()
        )));
    }

    let batch_size = options.embed_batch_size.max(1);
    let mut embeddings = Vec::with_capacity(report.chunks.len());
    for (batch_no, batch) in report.chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.content().to_string()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(IngestError::InvalidArgument(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        info!(batch = batch_no + 1, size = texts.len(), "embedded batch");
        embeddings.extend(vectors);
    }

    index.replace(&report.chunks, &embeddings).await?;
    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::LocalVectorStore;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    const NARRATIVE: &str = "আজ আমার বয়স সাতাশ মাত্র। এ জীবনটা না দৈর্ঘ্যের হিসাবে বড়, না গুণের হিসাবে। তবু ইহার একটু বিশেষ মূল্য আছে। ইহা সেই ফুলের মতো যাহার বুকের উপরে ভ্রমর আসিয়া বসিয়াছিল, এবং সেই পদক্ষেপের ইতিহাস তাহার জীবনের মাঝখানে ফলের মতো গুটি ধরিয়া উঠিয়াছে। মামা আমার ভাগ্য দেবতার প্রধান এজেন্ট।";

    const QUESTION_PAGE: &str = "বহুনির্বাচনি প্রশ্ন\n১। অনুপমের বয়স কত? (ক) পঁচিশ (খ) ছাব্বিশ (গ) সাতাশ (ঘ) আটাশ\n২। মামার সঙ্গে অনুপমের বয়সের পার্থক্য কত? (ক) ছয় (খ) সাত (গ) আট (ঘ) নয়";

    #[test]
    fn discover_source_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(nested.join("b.txt"), "text")?;
        fs::write(nested.join("c.md"), "text")?;
        fs::write(nested.join("cover.png"), [0u8; 4])?;

        let files = discover_source_files(base);
        assert_eq!(files.len(), 3);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn ingestion_fails_without_sources() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = collect_chunks(dir.path(), &IngestionOptions::default());
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn best_effort_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let report = collect_chunks(dir.path(), &IngestionOptions::default())?;

        assert_eq!(report.chunks.len(), 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn question_page_is_filtered_and_narrative_is_one_chunk() -> Result<(), IngestError> {
        let narrative_chars = NARRATIVE.chars().count();
        assert!((200..=300).contains(&narrative_chars));

        let document = SourceDocument {
            source_id: "aparichita.pdf".to_string(),
            pages: vec![
                PageText { number: 1, text: NARRATIVE.to_string() },
                PageText { number: 2, text: QUESTION_PAGE.to_string() },
            ],
        };
        let mut skipped = Vec::new();
        let (chunks, dropped) =
            prepare_document(&document, &PageCleaner::new()?, &IngestionOptions::default(), &mut skipped)?;

        assert_eq!(chunks.len(), 1);
        assert_eq!(dropped, 0);
        assert_eq!(chunks[0].page(), 1);
        assert_eq!(chunks[0].chunk_index(), 0);
        assert_eq!(
            skipped,
            vec![SkippedPage {
                source_id: "aparichita.pdf".to_string(),
                page: 2,
                kind: PageKind::QuestionList,
            }]
        );
        Ok(())
    }

    #[test]
    fn question_pages_can_be_kept() -> Result<(), IngestError> {
        let document = SourceDocument {
            source_id: "mcq.txt".to_string(),
            pages: vec![PageText { number: 1, text: QUESTION_PAGE.to_string() }],
        };
        let options = IngestionOptions {
            filter_question_pages: false,
            ..IngestionOptions::default()
        };
        let mut skipped = Vec::new();
        let (chunks, _) = prepare_document(&document, &PageCleaner::new()?, &options, &mut skipped)?;
        assert!(!chunks.is_empty());
        assert!(skipped.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ingest_folder_replaces_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("aparichita.txt"),
            format!("{NARRATIVE}\u{000C}{QUESTION_PAGE}"),
        )?;

        let store = LocalVectorStore::in_memory();
        store.replace(&[Chunk::new("stale", 1, 0, "old")], &[vec![1.0; 256]]).await?;

        let report = ingest_folder(
            dir.path(),
            &IngestionOptions::default(),
            &CharacterNgramEmbedder::default(),
            &store,
        )
        .await?;

        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.skipped_pages.len(), 1);
        assert_eq!(report.files.len(), 1);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn folder_without_content_leaves_index_alone() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("toc.md"), "সূচিপত্র")?;

        let store = LocalVectorStore::in_memory();
        store.replace(&[Chunk::new("kept", 1, 0, "old")], &[vec![1.0; 256]]).await?;

        let result = ingest_folder(
            dir.path(),
            &IngestionOptions::default(),
            &CharacterNgramEmbedder::default(),
            &store,
        )
        .await;

        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        assert_eq!(store.count().await?, 1);
        Ok(())
    }
}
