//! Document Extractor: converts an uploaded CV binary into raw text plus
//! best-effort metadata.
//!
//! PDF extraction falls back to OCR over embedded images when the document
//! has no text layer. OCR runs per image on the blocking pool with its own
//! timeout; one bad image never aborts the document.

pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod text;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extraction::ocr::OcrEngine;
use crate::sections::segment_sections;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    Pdf(String),

    #[error("Failed to process DOCX: {0}")]
    Docx(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR engine is not available in this build")]
    OcrUnavailable,

    #[error("Timed out after {0:?} during {1}")]
    Timeout(Duration, &'static str),

    #[error("Extraction task aborted: {0}")]
    Task(String),

    #[error("No usable text could be extracted from the document")]
    NoUsableText,
}

/// File kinds accepted by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Doc,
    Docx,
    Txt,
}

impl FileKind {
    pub const SUPPORTED_EXTENSIONS: [&'static str; 4] = ["pdf", "doc", "docx", "txt"];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "doc" => Some(FileKind::Doc),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Txt),
            _ => None,
        }
    }

    /// Resolves the kind from the text after the last `.` of a filename.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractionError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default();
        Self::from_extension(extension)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(extension.to_ascii_lowercase()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Doc => "doc",
            FileKind::Docx => "docx",
            FileKind::Txt => "txt",
        }
    }
}

/// Which method produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PdfText,
    PdfOcr,
    Docx,
    DocBinary,
    PlainText,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub page_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
    pub word_count: usize,
    pub method: ExtractionMethod,
    pub sections: BTreeMap<String, String>,
}

impl ExtractedDocument {
    pub fn new(text: String, metadata: DocumentMetadata, method: ExtractionMethod) -> Self {
        let word_count = text.split_whitespace().count();
        let sections = segment_sections(&text);
        Self {
            text,
            metadata,
            word_count,
            method,
            sections,
        }
    }
}

/// Entry point of the extraction stage. Cheap to clone.
#[derive(Clone)]
pub struct DocumentExtractor {
    ocr: Arc<dyn OcrEngine>,
    ocr_timeout: Duration,
}

impl DocumentExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, ocr_timeout: Duration) -> Self {
        Self { ocr, ocr_timeout }
    }

    /// Extracts text from `bytes` according to `kind`, then segments it.
    /// Fails with `NoUsableText` when every method came back empty.
    pub async fn extract(
        &self,
        bytes: Bytes,
        kind: FileKind,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let document = match kind {
            FileKind::Pdf => self.extract_pdf(bytes).await?,
            FileKind::Docx => {
                let text = run_blocking(move || docx::extract_docx(&bytes)).await??;
                ExtractedDocument::new(text, DocumentMetadata::default(), ExtractionMethod::Docx)
            }
            FileKind::Doc => {
                let (text, method) = run_blocking(move || docx::extract_doc(&bytes)).await?;
                ExtractedDocument::new(text, DocumentMetadata::default(), method)
            }
            FileKind::Txt => ExtractedDocument::new(
                text::decode_permissive(&bytes),
                DocumentMetadata::default(),
                ExtractionMethod::PlainText,
            ),
        };

        if document.text.trim().is_empty() {
            return Err(ExtractionError::NoUsableText);
        }

        debug!(
            kind = kind.extension(),
            words = document.word_count,
            sections = document.sections.len(),
            "Document extracted"
        );
        Ok(document)
    }

    async fn extract_pdf(&self, bytes: Bytes) -> Result<ExtractedDocument, ExtractionError> {
        let content = run_blocking(move || pdf::extract(&bytes)).await??;

        if !content.text.trim().is_empty() || content.images.is_empty() {
            return Ok(ExtractedDocument::new(
                content.text,
                content.metadata,
                ExtractionMethod::PdfText,
            ));
        }

        info!(
            images = content.images.len(),
            "PDF has no text layer, falling back to OCR"
        );

        let mut text = content.text;
        for (index, image) in content.images.into_iter().enumerate() {
            match self.recognize(image).await {
                Ok(recognized) => {
                    text.push_str(&recognized);
                    text.push('\n');
                }
                Err(e) => warn!(image = index, error = %e, "OCR failed for embedded image, skipping"),
            }
        }

        Ok(ExtractedDocument::new(
            text,
            content.metadata,
            ExtractionMethod::PdfOcr,
        ))
    }

    async fn recognize(&self, image: Vec<u8>) -> Result<String, ExtractionError> {
        let engine = self.ocr.clone();
        let task = tokio::task::spawn_blocking(move || engine.recognize(&image));
        match tokio::time::timeout(self.ocr_timeout, task).await {
            Ok(joined) => joined.map_err(|e| ExtractionError::Task(e.to_string()))?,
            Err(_) => Err(ExtractionError::Timeout(self.ocr_timeout, "ocr")),
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ExtractionError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))
}
