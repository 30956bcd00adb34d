//! Documents and their OCR'd pages.

use serde::{Deserialize, Serialize};

use crate::id::DocumentId;
use crate::table::TableJson;

/// Processing status carried on the document row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Ingested, no pipeline run yet.
    #[default]
    Pending,
    /// A workflow is currently processing the document.
    Processing,
    /// The pipeline finished all stages.
    Completed,
    /// The last workflow run failed.
    Failed,
}

impl ProcessingStatus {
    /// Stable string form used in rows and status queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// An ingested document. Created on ingest; status is mutated by stage
/// transitions; never deleted by the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Stable opaque identifier.
    pub id: DocumentId,
    /// Display name of the uploaded file.
    pub file_name: String,
    /// Storage path the byte-fetching collaborator resolves.
    pub file_path: Option<String>,
    /// Declared mime type at upload time.
    pub mime_type: String,
    /// Total page count, known after ingest inspection.
    pub page_count: u32,
    /// Current pipeline status.
    pub status: ProcessingStatus,
}

impl Document {
    /// Creates a pending document row.
    #[must_use]
    pub fn new(id: DocumentId, file_name: impl Into<String>, page_count: u32) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            file_path: None,
            mime_type: "application/pdf".to_owned(),
            page_count,
            status: ProcessingStatus::Pending,
        }
    }

    /// Sets the storage path.
    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}

/// Physical page geometry reported by the parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    /// Width in points.
    pub width: f32,
    /// Height in points.
    pub height: f32,
    /// Rotation in degrees (0, 90, 180, 270).
    pub rotation: i16,
}

/// Word-level coordinates for citation mapping. Optional; extraction
/// failure of this pass is non-fatal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    /// The word text.
    pub text: String,
    /// Left edge in page points.
    pub x: f32,
    /// Top edge in page points.
    pub y: f32,
    /// Box width in points.
    pub width: f32,
    /// Box height in points.
    pub height: f32,
}

/// Metadata bag attached to each page during OCR.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Whether any table (structural or markdown) was observed.
    pub has_tables: bool,
    /// Structural tables captured during parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural_tables: Vec<TableJson>,
    /// Which extraction path produced the canonical text.
    pub source: String,
    /// Optional word coordinates for citations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub word_boxes: Vec<WordBox>,
}

/// One OCR'd page. Owned by its document; replaced atomically on
/// re-extraction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    /// Owning document.
    pub document_id: DocumentId,
    /// 1-indexed page number.
    pub page_number: u32,
    /// Plain text content.
    pub text: String,
    /// Markdown rendition with table rows preserved.
    pub markdown: String,
    /// Page geometry.
    pub dimensions: PageDimensions,
    /// Extraction metadata.
    pub metadata: PageMetadata,
}

impl Page {
    /// Creates a page with empty metadata.
    #[must_use]
    pub fn new(
        document_id: DocumentId,
        page_number: u32,
        text: impl Into<String>,
        markdown: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            page_number,
            text: text.into(),
            markdown: markdown.into(),
            dimensions: PageDimensions::default(),
            metadata: PageMetadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_have_no_tables() {
        let page = Page::new(DocumentId::generate(), 1, "text", "text");
        assert!(!page.metadata.has_tables);
        assert!(page.metadata.structural_tables.is_empty());
    }
}
