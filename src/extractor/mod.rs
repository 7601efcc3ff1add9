
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Parser, TagEnd};
use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Elements whose text never reaches the knowledge base
const SKIPPED_HTML_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "nav", "header", "footer", "aside",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("document is not valid UTF-8: {0}")]
    InvalidEncoding(String),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),
}

/// Metadata shared by a document and every chunk cut from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub page_count: u32,
    pub uploaded_at: DateTime<Utc>,
}

/// Text pulled out of an uploaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Converts raw document bytes into plain text
pub trait Extractor: Send + Sync {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<ExtractedDocument, ExtractionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Html,
    Markdown,
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from a file name's extension
    #[inline]
    pub fn from_filename(filename: &str) -> Result<Self, ExtractionError> {
        let extension = Path::new(filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("html" | "htm" | "xhtml") => Ok(Self::Html),
            Some("md" | "markdown") => Ok(Self::Markdown),
            Some("txt" | "text") | None => Ok(Self::PlainText),
            Some(other) => Err(ExtractionError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Extractor that picks a strategy from the file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl FileExtractor {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for FileExtractor {
    #[inline]
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<ExtractedDocument, ExtractionError> {
        let format = DocumentFormat::from_filename(filename)?;
        debug!(
            "Extracting {} ({} bytes) as {:?}",
            filename,
            bytes.len(),
            format
        );

        let (text, page_count) = match format {
            DocumentFormat::Pdf => extract_pdf(bytes)?,
            DocumentFormat::Html => (extract_html(&decode_utf8(bytes)?), 1),
            DocumentFormat::Markdown => (extract_markdown(&decode_utf8(bytes)?), 1),
            DocumentFormat::PlainText => (decode_utf8(bytes)?, 1),
        };

        Ok(ExtractedDocument {
            text,
            metadata: DocumentMetadata {
                filename: filename.to_string(),
                page_count,
                uploaded_at: Utc::now(),
            },
        })
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ExtractionError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractionError::InvalidEncoding(e.to_string()))
}

/// Text of every page, pages separated by a blank line
fn extract_pdf(bytes: &[u8]) -> Result<(String, u32), ExtractionError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractionError::Malformed(format!("failed to parse PDF: {}", e)))?;

    if document.is_encrypted() {
        return Err(ExtractionError::Malformed(
            "encrypted PDFs are not supported".to_string(),
        ));
    }

    let pages = document.get_pages();
    let mut text = String::new();
    for page_number in pages.keys() {
        let page_text = document.extract_text(&[*page_number]).map_err(|e| {
            ExtractionError::Malformed(format!(
                "failed to read text of page {}: {}",
                page_number, e
            ))
        })?;
        text.push_str(page_text.trim_end());
        text.push_str("\n\n");
    }

    let page_count = u32::try_from(pages.len())
        .map_err(|_| ExtractionError::Malformed("too many pages".to_string()))?;
    Ok((text, page_count))
}

/// Visible text of an HTML document, one text node per line
fn extract_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_HTML_TAGS.contains(&element.name()))
        });
        let fragment = fragment.trim();
        if !hidden && !fragment.is_empty() {
            text.push_str(fragment);
            text.push('\n');
        }
    }

    text
}

/// Markdown with markup removed, keeping block boundaries as line breaks
fn extract_markdown(markdown: &str) -> String {
    let mut text = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Text(content) | Event::Code(content) => text.push_str(&content),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableCell,
            ) => text.push('\n'),
            _ => {}
        }
    }

    text
}
