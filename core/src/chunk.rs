//! Section types, hybrid chunks, and super-chunks.

use serde::{Deserialize, Serialize};

use crate::id::{ChunkId, DocumentId};

/// Content section of an insurance document.
///
/// Assigned once during page analysis and treated as authoritative by every
/// downstream consumer; chunking and extraction never re-detect sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    /// Declarations page: named insured, policy number, dates, limits.
    Declarations,
    /// Coverage grants.
    Coverages,
    /// Policy conditions.
    Conditions,
    /// Exclusions.
    Exclusions,
    /// Endorsements modifying the base form.
    Endorsements,
    /// Insuring agreement language.
    InsuringAgreement,
    /// Defined terms.
    Definitions,
    /// Premium breakdown.
    PremiumSummary,
    /// Statement of values or other scheduled property listing.
    Schedule,
    /// Loss-run claims listing.
    LossRun,
    /// Anything not matching a known section.
    Other,
}

impl SectionType {
    /// Stable string form used as map keys and row values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Declarations => "declarations",
            Self::Coverages => "coverages",
            Self::Conditions => "conditions",
            Self::Exclusions => "exclusions",
            Self::Endorsements => "endorsements",
            Self::InsuringAgreement => "insuring_agreement",
            Self::Definitions => "definitions",
            Self::PremiumSummary => "premium_summary",
            Self::Schedule => "schedule",
            Self::LossRun => "loss_run",
            Self::Other => "other",
        }
    }

    /// Extraction order. Lower runs first.
    #[must_use]
    pub const fn processing_priority(self) -> u8 {
        match self {
            Self::Declarations => 0,
            Self::Coverages => 1,
            Self::Conditions => 2,
            Self::Exclusions => 3,
            Self::Endorsements => 4,
            Self::InsuringAgreement => 5,
            Self::Definitions => 6,
            Self::PremiumSummary => 7,
            Self::Schedule => 8,
            Self::LossRun => 9,
            Self::Other => 10,
        }
    }

    /// Whether the section needs an LLM pass. Purely structural sections
    /// (schedules, loss runs) are handled by the table pipeline instead.
    #[must_use]
    pub const fn requires_llm(self) -> bool {
        !matches!(self, Self::Schedule | Self::LossRun)
    }

    /// All section variants, in priority order.
    #[must_use]
    pub const fn all() -> [Self; 11] {
        [
            Self::Declarations,
            Self::Coverages,
            Self::Conditions,
            Self::Exclusions,
            Self::Endorsements,
            Self::InsuringAgreement,
            Self::Definitions,
            Self::PremiumSummary,
            Self::Schedule,
            Self::LossRun,
            Self::Other,
        ]
    }
}

/// A chunk of page text with stable identity and provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HybridChunk {
    /// Content-hash identifier; identical across runs for identical input.
    pub id: ChunkId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Chunk text.
    pub text: String,
    /// Estimated token count.
    pub token_count: usize,
    /// Section inherited from the manifest's page map.
    pub section_type: SectionType,
    /// Source pages, ascending.
    pub pages: Vec<u32>,
}

impl HybridChunk {
    /// Inclusive page range covered by this chunk, if any pages are known.
    #[must_use]
    pub fn page_range(&self) -> Option<(u32, u32)> {
        match (self.pages.first(), self.pages.last()) {
            (Some(&start), Some(&end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// Token-bounded concatenation of contiguous same-section chunks, fed to a
/// section-specific extractor. Transient: rebuilt from chunks on demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionSuperChunk {
    /// Common section of the member chunks.
    pub section_type: SectionType,
    /// Member chunks in document order.
    pub chunks: Vec<HybridChunk>,
    /// Sum of member token counts.
    pub total_tokens: usize,
    /// Extraction order; copied from the section type at build time.
    pub processing_priority: u8,
    /// Whether this super-chunk is routed through an LLM extractor.
    pub requires_llm: bool,
}

impl SectionSuperChunk {
    /// Concatenated text of all member chunks.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&chunk.text);
        }
        out
    }

    /// Member chunk ids in order.
    #[must_use]
    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|c| c.id.clone()).collect()
    }

    /// Union of member pages, ascending and deduplicated.
    #[must_use]
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.chunks.iter().flat_map(|c| c.pages.clone()).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// Inclusive page range across member chunks.
    #[must_use]
    pub fn page_range(&self) -> Option<(u32, u32)> {
        let pages = self.pages();
        match (pages.first(), pages.last()) {
            (Some(&start), Some(&end)) => Some((start, end)),
            _ => None,
        }
    }
}
