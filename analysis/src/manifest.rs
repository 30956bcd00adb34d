//! Manifest and document-profile construction.

use std::collections::BTreeMap;

use bindery_core::{
    BinderyError, DocumentId, DocumentProfile, DocumentType, PageClassification, PageManifest,
    PageSignal, Result, SectionBoundary, SectionType,
};
use tracing::info;

/// Builds the per-document processing plan from page classifications.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder;

impl ManifestBuilder {
    /// Creates a manifest builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`BinderyError::InvariantViolation`] when a classification
    /// references a page outside `1..=total_pages`.
    pub fn build(
        &self,
        document_id: DocumentId,
        total_pages: u32,
        classifications: Vec<PageClassification>,
        signals: &[PageSignal],
    ) -> Result<PageManifest> {
        for c in &classifications {
            if c.page_number == 0 || c.page_number > total_pages {
                return Err(BinderyError::InvariantViolation(format!(
                    "page {} outside document bounds 1..={total_pages}",
                    c.page_number
                )));
            }
        }

        let mut pages_to_process = Vec::new();
        let mut pages_skipped = Vec::new();
        let mut page_section_map = BTreeMap::new();

        for c in &classifications {
            if c.should_process && c.duplicate_of.is_none() {
                pages_to_process.push(c.page_number);
            } else {
                pages_skipped.push(c.page_number);
            }
            if let Some(section) = c.page_type.section_type() {
                page_section_map.insert(c.page_number, section);
            }
        }
        pages_to_process.sort_unstable();
        pages_skipped.sort_unstable();

        let boundaries = section_boundaries(&classifications, signals);
        let (document_type, confidence) = infer_document_type(&boundaries, signals);
        let document_subtype = infer_subtype(signals);

        let profile = DocumentProfile {
            document_id,
            document_type,
            document_subtype,
            confidence,
            section_boundaries: boundaries,
        };

        let manifest = PageManifest {
            document_id,
            total_pages,
            pages_to_process,
            pages_skipped,
            page_section_map,
            classifications,
            document_profile: profile,
        };

        info!(
            document_id = %document_id,
            total_pages,
            to_process = manifest.pages_to_process.len(),
            skipped = manifest.pages_skipped.len(),
            document_type = manifest.document_profile.document_type.as_str(),
            "manifest built"
        );

        Ok(manifest)
    }
}

/// Contiguous runs of the same section form a boundary; the run confidence
/// is the mean of its constituents.
fn section_boundaries(
    classifications: &[PageClassification],
    signals: &[PageSignal],
) -> Vec<SectionBoundary> {
    let mut boundaries: Vec<SectionBoundary> = Vec::new();
    let mut run: Option<(SectionType, u32, u32, f32, u32)> = None;

    let anchor_for = |page: u32| -> Option<String> {
        signals
            .iter()
            .find(|s| s.page_number == page)
            .map(|s| s.top_text.lines().next().unwrap_or_default().to_owned())
            .filter(|t| !t.is_empty())
    };

    for c in classifications {
        let Some(section) = c.page_type.section_type() else {
            continue;
        };
        match run {
            Some((current, start, end, conf_sum, count))
                if current == section && c.page_number == end + 1 =>
            {
                run = Some((current, start, c.page_number, conf_sum + c.confidence, count + 1));
            }
            Some((current, start, end, conf_sum, count)) => {
                boundaries.push(SectionBoundary {
                    section_type: current,
                    start_page: start,
                    end_page: end,
                    confidence: conf_sum / count as f32,
                    anchor_text: anchor_for(start),
                });
                run = Some((section, c.page_number, c.page_number, c.confidence, 1));
            }
            None => {
                run = Some((section, c.page_number, c.page_number, c.confidence, 1));
            }
        }
    }

    if let Some((current, start, end, conf_sum, count)) = run {
        boundaries.push(SectionBoundary {
            section_type: current,
            start_page: start,
            end_page: end,
            confidence: conf_sum / count as f32,
            anchor_text: anchor_for(start),
        });
    }

    boundaries
}

fn infer_document_type(
    boundaries: &[SectionBoundary],
    signals: &[PageSignal],
) -> (DocumentType, f32) {
    let pages_of = |section: SectionType| -> u32 {
        boundaries
            .iter()
            .filter(|b| b.section_type == section)
            .map(SectionBoundary::page_count)
            .sum()
    };

    let total: u32 = boundaries.iter().map(SectionBoundary::page_count).sum();
    if total == 0 {
        return (DocumentType::Unknown, 0.0);
    }

    let mentions_quote = signals
        .iter()
        .take(2)
        .any(|s| {
            let top = s.top_text.to_lowercase();
            top.contains("quote") || top.contains("proposal of insurance")
        });

    let loss_run_pages = pages_of(SectionType::LossRun);
    let schedule_pages = pages_of(SectionType::Schedule);
    let has_declarations = pages_of(SectionType::Declarations) > 0;
    let has_policy_body = pages_of(SectionType::Coverages) > 0
        || pages_of(SectionType::Exclusions) > 0
        || pages_of(SectionType::InsuringAgreement) > 0;

    if loss_run_pages * 2 > total {
        (DocumentType::LossRun, loss_run_pages as f32 / total as f32)
    } else if schedule_pages * 2 > total && !has_declarations {
        (DocumentType::Schedule, schedule_pages as f32 / total as f32)
    } else if mentions_quote {
        (DocumentType::Quote, 0.7)
    } else if has_declarations || has_policy_body {
        let covered = boundaries
            .iter()
            .map(|b| f64::from(b.confidence) * f64::from(b.page_count()))
            .sum::<f64>()
            / f64::from(total);
        (DocumentType::Policy, covered as f32)
    } else {
        (DocumentType::Unknown, 0.3)
    }
}

fn infer_subtype(signals: &[PageSignal]) -> Option<String> {
    let joined: String = signals
        .iter()
        .take(3)
        .map(|s| s.top_text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    for (needle, subtype) in [
        ("business auto", "commercial_auto"),
        ("commercial auto", "commercial_auto"),
        ("general liability", "general_liability"),
        ("workers compensation", "workers_comp"),
        ("commercial property", "commercial_property"),
        ("inland marine", "inland_marine"),
        ("umbrella", "umbrella"),
    ] {
        if joined.contains(needle) {
            return Some(subtype.to_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::PageType;

    fn classification(page: u32, section: SectionType, confidence: f32) -> PageClassification {
        PageClassification {
            page_number: page,
            page_type: PageType::Section(section),
            confidence,
            should_process: true,
            duplicate_of: None,
        }
    }

    fn skipped(page: u32) -> PageClassification {
        PageClassification {
            page_number: page,
            page_type: PageType::Boilerplate,
            confidence: 0.8,
            should_process: false,
            duplicate_of: None,
        }
    }

    #[test]
    fn processed_and_skipped_sets_are_disjoint() {
        let manifest = ManifestBuilder::new()
            .build(
                DocumentId::generate(),
                3,
                vec![
                    classification(1, SectionType::Declarations, 0.9),
                    skipped(2),
                    classification(3, SectionType::Coverages, 0.8),
                ],
                &[],
            )
            .unwrap();
        assert_eq!(manifest.pages_to_process, vec![1, 3]);
        assert_eq!(manifest.pages_skipped, vec![2]);
        for page in &manifest.pages_to_process {
            assert!(!manifest.pages_skipped.contains(page));
        }
        assert!((manifest.processing_ratio() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn contiguous_runs_merge_with_mean_confidence() {
        let manifest = ManifestBuilder::new()
            .build(
                DocumentId::generate(),
                4,
                vec![
                    classification(1, SectionType::Exclusions, 0.9),
                    classification(2, SectionType::Exclusions, 0.5),
                    classification(3, SectionType::Endorsements, 0.8),
                    classification(4, SectionType::Endorsements, 0.8),
                ],
                &[],
            )
            .unwrap();
        let boundaries = &manifest.document_profile.section_boundaries;
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].start_page, 1);
        assert_eq!(boundaries[0].end_page, 2);
        assert!((boundaries[0].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_page_is_invariant_violation() {
        let err = ManifestBuilder::new()
            .build(
                DocumentId::generate(),
                1,
                vec![classification(5, SectionType::Coverages, 0.8)],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, BinderyError::InvariantViolation(_)));
    }

    #[test]
    fn policy_body_infers_policy_type() {
        let manifest = ManifestBuilder::new()
            .build(
                DocumentId::generate(),
                2,
                vec![
                    classification(1, SectionType::Declarations, 0.9),
                    classification(2, SectionType::Coverages, 0.8),
                ],
                &[],
            )
            .unwrap();
        assert_eq!(
            manifest.document_profile.document_type,
            DocumentType::Policy
        );
    }

    #[test]
    fn empty_document_builds_empty_manifest() {
        let manifest = ManifestBuilder::new()
            .build(DocumentId::generate(), 0, Vec::new(), &[])
            .unwrap();
        assert!(manifest.pages_to_process.is_empty());
        assert!(manifest.page_section_map.is_empty());
        assert!(manifest.processing_ratio().abs() < f32::EPSILON);
    }
}
