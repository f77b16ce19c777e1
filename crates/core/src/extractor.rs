use crate::error::IngestError;
use crate::models::{PageText, SourceDocument};
use lopdf::Document;
use std::fmt::Display;
use std::path::Path;
use tracing::warn;

pub trait PageExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PageExtractor for LopdfExtractor {
    /// Pages whose text cannot be decoded come back empty rather than failing
    /// the whole file; the caller counts and reports them.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = text_or_empty(page_no, document.extract_text(&[page_no]));
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

fn text_or_empty<E: Display>(page_no: u32, decoded: Result<String, E>) -> String {
    match decoded {
        Ok(text) => text,
        Err(error) => {
            warn!(page = page_no, %error, "page text could not be decoded");
            String::new()
        }
    }
}

/// Plain text and markdown files. Form feeds separate pages when present.
#[derive(Default)]
pub struct PlainTextExtractor;

impl PageExtractor for PlainTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(split_form_feeds(&raw))
    }
}

fn split_form_feeds(raw: &str) -> Vec<PageText> {
    raw.split('\u{000c}')
        .enumerate()
        .map(|(index, text)| PageText {
            number: (index + 1) as u32,
            text: text.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Text,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(SourceKind::Pdf)
        } else if extension.eq_ignore_ascii_case("txt") || extension.eq_ignore_ascii_case("md") {
            Some(SourceKind::Text)
        } else {
            None
        }
    }
}

pub fn extract_document(path: &Path) -> Result<SourceDocument, IngestError> {
    let source_id = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();

    let pages = match SourceKind::from_path(path) {
        Some(SourceKind::Pdf) => LopdfExtractor.extract_pages(path)?,
        Some(SourceKind::Text) => PlainTextExtractor.extract_pages(path)?,
        None => {
            return Err(IngestError::InvalidArgument(format!(
                "unsupported file type: {}",
                path.display()
            )))
        }
    };

    Ok(SourceDocument { source_id, pages })
}
