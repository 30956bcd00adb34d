//! The hybrid chunker and super-chunk builder.

use std::collections::BTreeMap;

use bindery_core::{
    ChunkId, ChunkingBudgets, HybridChunk, Page, SectionSuperChunk, SectionType,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

use crate::tokens::estimate_tokens;

/// Aggregate statistics for a chunking run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChunkingStatistics {
    /// Number of chunks produced.
    pub chunk_count: usize,
    /// Number of super-chunks produced.
    pub super_chunk_count: usize,
    /// Mean tokens per chunk.
    pub avg_tokens_per_chunk: f64,
    /// Largest chunk in tokens.
    pub max_chunk_tokens: usize,
}

/// Output of [`HybridChunker::chunk_pages`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingResult {
    /// All chunks, in document order.
    pub chunks: Vec<HybridChunk>,
    /// Super-chunks grouping contiguous same-section chunks.
    pub super_chunks: Vec<SectionSuperChunk>,
    /// Chunk count per section.
    pub section_map: BTreeMap<SectionType, usize>,
    /// Total estimated tokens across chunks.
    pub total_tokens: usize,
    /// Run statistics.
    pub statistics: ChunkingStatistics,
}

/// Paragraph-aware chunker driven by the manifest's page → section map.
#[derive(Debug, Clone)]
pub struct HybridChunker {
    budgets: ChunkingBudgets,
}

impl HybridChunker {
    /// Creates a chunker with the given token budgets.
    #[must_use]
    pub const fn new(budgets: ChunkingBudgets) -> Self {
        Self { budgets }
    }

    /// Chunks pages into section-labelled chunks and super-chunks.
    ///
    /// `page_section_map` is authoritative: a page absent from the map is
    /// chunked under [`SectionType::Other`]. Pages must be in ascending
    /// page order.
    #[must_use]
    pub fn chunk_pages(
        &self,
        pages: &[Page],
        page_section_map: &BTreeMap<u32, SectionType>,
    ) -> ChunkingResult {
        let mut chunks: Vec<HybridChunk> = Vec::new();

        for run in section_runs(pages, page_section_map) {
            self.chunk_run(&run, &mut chunks);
        }

        let super_chunks = self.build_super_chunks(&chunks);

        let mut section_map: BTreeMap<SectionType, usize> = BTreeMap::new();
        for chunk in &chunks {
            *section_map.entry(chunk.section_type).or_default() += 1;
        }
        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        let statistics = ChunkingStatistics {
            chunk_count: chunks.len(),
            super_chunk_count: super_chunks.len(),
            avg_tokens_per_chunk: if chunks.is_empty() {
                0.0
            } else {
                total_tokens as f64 / chunks.len() as f64
            },
            max_chunk_tokens: chunks.iter().map(|c| c.token_count).max().unwrap_or(0),
        };

        info!(
            chunks = chunks.len(),
            super_chunks = super_chunks.len(),
            total_tokens,
            "chunking complete"
        );

        ChunkingResult {
            chunks,
            super_chunks,
            section_map,
            total_tokens,
            statistics,
        }
    }

    fn chunk_run(&self, run: &SectionRun, out: &mut Vec<HybridChunk>) {
        let mut current: Vec<&Unit> = Vec::new();
        let mut current_tokens = 0usize;

        let flush = |current: &mut Vec<&Unit>, current_tokens: &mut usize, out: &mut Vec<HybridChunk>| {
            if current.is_empty() {
                return;
            }
            out.push(build_chunk(run, current));
            current.clear();
            *current_tokens = 0;
        };

        for unit in &run.units {
            if current_tokens + unit.tokens > self.budgets.max_tokens && !current.is_empty() {
                // Close the chunk, then seed the next one with trailing
                // units up to the overlap budget so context survives the cut.
                let overlap = trailing_overlap(&current, self.budgets.overlap_tokens);
                flush(&mut current, &mut current_tokens, out);
                for carried in overlap {
                    current_tokens += carried.tokens;
                    current.push(carried);
                }
            }
            current_tokens += unit.tokens;
            current.push(unit);
        }
        flush(&mut current, &mut current_tokens, out);
    }

    fn build_super_chunks(&self, chunks: &[HybridChunk]) -> Vec<SectionSuperChunk> {
        let mut super_chunks: Vec<SectionSuperChunk> = Vec::new();
        let mut current: Vec<HybridChunk> = Vec::new();
        let mut current_tokens = 0usize;
        let mut current_section: Option<SectionType> = None;

        let flush = |current: &mut Vec<HybridChunk>,
                         current_tokens: &mut usize,
                         section: Option<SectionType>,
                         super_chunks: &mut Vec<SectionSuperChunk>| {
            let Some(section) = section else { return };
            if current.is_empty() {
                return;
            }
            super_chunks.push(SectionSuperChunk {
                section_type: section,
                chunks: std::mem::take(current),
                total_tokens: *current_tokens,
                processing_priority: section.processing_priority(),
                requires_llm: section.requires_llm(),
            });
            *current_tokens = 0;
        };

        for chunk in chunks {
            let section_changed = current_section != Some(chunk.section_type);
            let over_budget =
                current_tokens + chunk.token_count > self.budgets.max_tokens_per_super_chunk;
            if section_changed || over_budget {
                flush(&mut current, &mut current_tokens, current_section, &mut super_chunks);
                current_section = Some(chunk.section_type);
            }
            current_tokens += chunk.token_count;
            current.push(chunk.clone());
        }
        flush(&mut current, &mut current_tokens, current_section, &mut super_chunks);

        super_chunks
    }
}

/// A paragraph (or heading) with provenance.
#[derive(Debug)]
struct Unit {
    page_number: u32,
    text: String,
    tokens: usize,
}

/// A contiguous run of pages sharing one section.
#[derive(Debug)]
struct SectionRun {
    section: SectionType,
    document_id: bindery_core::DocumentId,
    units: Vec<Unit>,
}

fn section_runs(pages: &[Page], page_section_map: &BTreeMap<u32, SectionType>) -> Vec<SectionRun> {
    let mut runs: Vec<SectionRun> = Vec::new();
    for page in pages {
        let section = page_section_map
            .get(&page.page_number)
            .copied()
            .unwrap_or(SectionType::Other);
        let needs_new_run = runs
            .last()
            .is_none_or(|run| run.section != section);
        if needs_new_run {
            runs.push(SectionRun {
                section,
                document_id: page.document_id,
                units: Vec::new(),
            });
        }
        let run = runs.last_mut().unwrap_or_else(|| unreachable!());
        for paragraph in paragraphs(&page.text) {
            run.units.push(Unit {
                page_number: page.page_number,
                tokens: estimate_tokens(&paragraph),
                text: paragraph,
            });
        }
    }
    runs.retain(|run| !run.units.is_empty());
    runs
}

/// Splits text on blank lines; headings (short all-caps lines) start a new
/// paragraph so section titles stay at chunk heads.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();

    let mut push_current = |current: &mut String, out: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_owned());
        }
        current.clear();
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            push_current(&mut current, &mut out);
            continue;
        }
        if is_heading(trimmed) && !current.is_empty() {
            push_current(&mut current, &mut out);
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(trimmed);
    }
    push_current(&mut current, &mut out);
    out
}

fn is_heading(line: &str) -> bool {
    line.len() <= 60
        && line.chars().any(char::is_alphabetic)
        && line
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase)
}

fn trailing_overlap<'a>(units: &[&'a Unit], overlap_tokens: usize) -> Vec<&'a Unit> {
    let mut carried: Vec<&Unit> = Vec::new();
    let mut total = 0usize;
    for unit in units.iter().rev() {
        if total + unit.tokens > overlap_tokens {
            break;
        }
        total += unit.tokens;
        carried.push(unit);
    }
    carried.reverse();
    carried
}

fn build_chunk(run: &SectionRun, units: &[&Unit]) -> HybridChunk {
    let text = units
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let mut pages: Vec<u32> = units.iter().map(|u| u.page_number).collect();
    pages.sort_unstable();
    pages.dedup();
    let token_count = estimate_tokens(&text);
    HybridChunk {
        id: stable_chunk_id(run.section, &text),
        document_id: run.document_id,
        token_count,
        section_type: run.section,
        pages,
        text,
    }
}

/// Stable chunk id: xxh3 of the section tag and chunk text.
#[must_use]
pub fn stable_chunk_id(section: SectionType, text: &str) -> ChunkId {
    let mut keyed = String::with_capacity(text.len() + 16);
    keyed.push_str(section.as_str());
    keyed.push('\u{1f}');
    keyed.push_str(text);
    ChunkId::new(format!("{:016x}", xxh3_64(keyed.as_bytes())))
}
