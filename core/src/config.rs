//! Per-product pipeline configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chunk::SectionType;
use crate::mention::EntityType;

/// Supported LLM providers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Google Gemini.
    #[default]
    Gemini,
    /// OpenRouter (OpenAI-compatible).
    OpenRouter,
}

/// Provider connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Which provider to use.
    pub provider: LlmProvider,
    /// Model name.
    pub model: String,
    /// API key.
    pub api_key: String,
    /// Override API base URL (OpenRouter-style deployments).
    pub api_url: Option<Url>,
}

/// Token budgets used by the hybrid chunker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ChunkingBudgets {
    /// Soft token cap per chunk.
    pub max_tokens: usize,
    /// Token overlap between adjacent chunks of one page run.
    pub overlap_tokens: usize,
    /// Token cap per section super-chunk.
    pub max_tokens_per_super_chunk: usize,
}

impl Default for ChunkingBudgets {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 50,
            max_tokens_per_super_chunk: 6000,
        }
    }
}

/// Product-specific pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sections the product needs extracted; empty means all.
    pub required_sections: Vec<SectionType>,
    /// Entities the product needs resolved; empty means all.
    pub required_entities: Vec<EntityType>,
    /// Chunker budgets.
    pub chunking: ChunkingBudgets,
    /// Synthesis confidence below which LLM fallback is recommended.
    pub confidence_threshold: f32,
    /// Whether LLM inference fallback may run at all.
    pub enable_llm_fallback: bool,
    /// Whether the table-extraction sub-workflow runs.
    pub ensure_table_extraction: bool,
    /// Provider settings; absent when no LLM is configured (tests,
    /// structural-only products).
    pub llm: Option<LlmSettings>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            required_sections: Vec::new(),
            required_entities: Vec::new(),
            chunking: ChunkingBudgets::default(),
            confidence_threshold: 0.7,
            enable_llm_fallback: true,
            ensure_table_extraction: true,
            llm: None,
        }
    }
}

impl PipelineConfig {
    /// Whether the product asked for a specific section.
    #[must_use]
    pub fn wants_section(&self, section: SectionType) -> bool {
        self.required_sections.is_empty() || self.required_sections.contains(&section)
    }
}
