//! Page analysis outputs: signals, classifications, manifest, profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::SectionType;
use crate::id::DocumentId;

/// Lightweight per-page features computed without full OCR.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageSignal {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Characters per page area unit; proxy for text-heaviness.
    pub text_density: f32,
    /// Character count of the raw text.
    pub char_count: usize,
    /// Word count.
    pub word_count: usize,
    /// Line count.
    pub line_count: usize,
    /// Whether table structure was observed.
    pub has_tables: bool,
    /// Lexical fingerprint for near-duplicate detection.
    pub fingerprint: String,
    /// Leading text used for anchor extraction.
    pub top_text: String,
}

/// Classification assigned to a page by the rule classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    /// A content section page.
    Section(SectionType),
    /// Boilerplate (signature pages, notices, jacket pages).
    Boilerplate,
    /// Near-duplicate of an earlier page.
    Duplicate,
}

impl PageType {
    /// Section type for content pages; `None` for boilerplate/duplicates.
    #[must_use]
    pub const fn section_type(self) -> Option<SectionType> {
        match self {
            Self::Section(section) => Some(section),
            Self::Boilerplate | Self::Duplicate => None,
        }
    }

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Section(section) => section.as_str(),
            Self::Boilerplate => "boilerplate",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Per-page classification result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageClassification {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Assigned page type.
    pub page_type: PageType,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
    /// Whether the page should be fully processed downstream.
    pub should_process: bool,
    /// Page number this page duplicates, when detected.
    pub duplicate_of: Option<u32>,
}

/// A contiguous run of pages sharing a section type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionBoundary {
    /// Section of the run.
    pub section_type: SectionType,
    /// First page of the run (1-indexed, inclusive).
    pub start_page: u32,
    /// Last page of the run (inclusive).
    pub end_page: u32,
    /// Mean confidence of the constituent classifications.
    pub confidence: f32,
    /// Leading text of the first page, for display.
    pub anchor_text: Option<String>,
}

impl SectionBoundary {
    /// Number of pages in the run.
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        self.end_page - self.start_page + 1
    }
}

/// Coarse document category inferred from the section mix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Issued policy.
    Policy,
    /// Quote or proposal from a carrier.
    Quote,
    /// Standalone schedule (SOV, equipment, auto).
    Schedule,
    /// Loss-run report.
    LossRun,
    /// Could not be determined.
    #[default]
    Unknown,
}

impl DocumentType {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Quote => "quote",
            Self::Schedule => "schedule",
            Self::LossRun => "loss_run",
            Self::Unknown => "unknown",
        }
    }
}

/// Document-level profile derived from page classifications.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentProfile {
    /// Owning document.
    pub document_id: DocumentId,
    /// Inferred category.
    pub document_type: DocumentType,
    /// Optional finer-grained subtype (e.g. "commercial_auto").
    pub document_subtype: Option<String>,
    /// Profile confidence in `[0, 1]`.
    pub confidence: f32,
    /// Contiguous section runs, in page order.
    pub section_boundaries: Vec<SectionBoundary>,
}

/// Per-document processing plan. One per document; superseded on
/// re-analysis. The `page_section_map` is the authoritative section
/// assignment for every downstream consumer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageManifest {
    /// Owning document.
    pub document_id: DocumentId,
    /// Total pages of the document.
    pub total_pages: u32,
    /// Pages selected for full processing, ascending.
    pub pages_to_process: Vec<u32>,
    /// Pages excluded (boilerplate, duplicates, low-value), ascending.
    pub pages_skipped: Vec<u32>,
    /// Authoritative page → section assignment.
    pub page_section_map: BTreeMap<u32, SectionType>,
    /// The classifications the manifest was built from.
    pub classifications: Vec<PageClassification>,
    /// Document profile with section boundaries.
    pub document_profile: DocumentProfile,
}

impl PageManifest {
    /// Share of pages selected for processing.
    #[must_use]
    pub fn processing_ratio(&self) -> f32 {
        if self.total_pages == 0 {
            return 0.0;
        }
        self.pages_to_process.len() as f32 / self.total_pages as f32
    }

    /// Estimated share of OCR cost avoided by skipping pages.
    #[must_use]
    pub fn cost_savings_estimate(&self) -> f32 {
        1.0 - self.processing_ratio()
    }

    /// Section of a page per the authoritative map.
    #[must_use]
    pub fn section_of(&self, page_number: u32) -> Option<SectionType> {
        self.page_section_map.get(&page_number).copied()
    }
}
