//! Standard coverage and exclusion taxonomy for canonical-id generation.
//!
//! Maps the many real-world spellings of standard ISO provisions to stable
//! identifiers so the same provision matches across documents. Lookup is
//! exact first, then containment with a length-ratio threshold; names with
//! no taxonomy entry get a normalised slug id instead.

use bindery_core::text::normalize_key;

/// High-level coverage categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverageCategory {
    /// Commercial auto.
    Auto,
    /// Commercial general liability.
    GeneralLiability,
    /// Property.
    Property,
    /// Workers compensation.
    WorkersComp,
    /// Umbrella / excess.
    Umbrella,
    /// Professional liability.
    Professional,
    /// Cyber.
    Cyber,
    /// Inland marine.
    InlandMarine,
    /// Could not be determined.
    Unknown,
}

impl CoverageCategory {
    /// Short tag used in slug ids.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::GeneralLiability => "gl",
            Self::Property => "property",
            Self::WorkersComp => "wc",
            Self::Umbrella => "umbrella",
            Self::Professional => "professional",
            Self::Cyber => "cyber",
            Self::InlandMarine => "im",
            Self::Unknown => "unknown",
        }
    }
}

/// One taxonomy entry: canonical id, standard name, known variations,
/// category, and the ISO form it belongs to.
pub struct TaxonomyEntry {
    /// Stable identifier.
    pub canonical_id: &'static str,
    /// Standard provision name.
    pub standard_name: &'static str,
    /// Name variations seen in the wild.
    pub variations: &'static [&'static str],
    /// Coverage category.
    pub category: CoverageCategory,
    /// ISO form reference.
    pub iso_form: Option<&'static str>,
}

/// Standard coverages.
pub const COVERAGE_TAXONOMY: &[TaxonomyEntry] = &[
    TaxonomyEntry {
        canonical_id: "CA_LIABILITY",
        standard_name: "Covered Autos Liability Coverage",
        variations: &[
            "covered autos liability",
            "auto liability",
            "business auto liability",
            "commercial auto liability",
            "automobile liability",
            "vehicle liability",
        ],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_COMPREHENSIVE",
        standard_name: "Comprehensive Coverage",
        variations: &["comprehensive", "other than collision", "otc coverage"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_COLLISION",
        standard_name: "Collision Coverage",
        variations: &["collision", "collision loss"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_SPECIFIED_PERILS",
        standard_name: "Specified Causes Of Loss Coverage",
        variations: &["specified causes of loss", "specified perils", "named perils auto"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_UNINSURED_MOTORIST",
        standard_name: "Uninsured Motorists Coverage",
        variations: &[
            "uninsured motorist",
            "uninsured motorists",
            "um coverage",
            "underinsured motorist",
        ],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_MEDICAL_PAYMENTS",
        standard_name: "Medical Payments Coverage",
        variations: &["medical payments", "med pay", "auto medical payments"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_HIRED_AUTO",
        standard_name: "Hired Auto Coverage",
        variations: &["hired auto", "hired car", "hired vehicle", "rental car coverage"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_NON_OWNED_AUTO",
        standard_name: "Non-Owned Auto Coverage",
        variations: &["non-owned auto", "non owned auto", "employee auto"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "CA_TOWING",
        standard_name: "Towing And Labor Coverage",
        variations: &["towing", "towing and labor", "roadside assistance"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "GL_COMBINED",
        standard_name: "Commercial General Liability",
        variations: &["general liability", "cgl", "cgl coverage", "gl coverage"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "GL_PREMISES_OPS",
        standard_name: "Premises And Operations Liability",
        variations: &[
            "premises and operations",
            "premises liability",
            "operations liability",
            "coverage a",
        ],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "GL_PRODUCTS_COMPLETED_OPS",
        standard_name: "Products-Completed Operations Liability",
        variations: &[
            "products completed operations",
            "products liability",
            "completed operations",
        ],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "GL_PERSONAL_ADVERTISING",
        standard_name: "Personal And Advertising Injury Liability",
        variations: &["personal and advertising injury", "advertising injury", "coverage b"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
];

/// Standard exclusions.
pub const EXCLUSION_TAXONOMY: &[TaxonomyEntry] = &[
    TaxonomyEntry {
        canonical_id: "EXCL_CA_EXPECTED_INTENDED",
        standard_name: "Expected Or Intended Injury",
        variations: &["expected or intended", "intentional injury", "intentional acts"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_CA_CONTRACTUAL",
        standard_name: "Contractual Liability",
        variations: &["contractual", "contractual liability", "assumed liability"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_CA_WORKERS_COMP",
        standard_name: "Workers Compensation",
        variations: &["workers compensation exclusion", "employee injury", "fellow employee"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_CA_CARE_CUSTODY",
        standard_name: "Care Custody Or Control",
        variations: &["care custody control", "care, custody, or control", "property in care"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_CA_WAR",
        standard_name: "War",
        variations: &["war exclusion", "acts of war"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_CA_RACING",
        standard_name: "Racing",
        variations: &["racing exclusion", "speed contest"],
        category: CoverageCategory::Auto,
        iso_form: Some("CA 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_GL_CONTRACTUAL",
        standard_name: "Contractual Liability",
        variations: &["contractual liability", "assumed under contract"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_GL_LIQUOR",
        standard_name: "Liquor Liability",
        variations: &["liquor liability", "alcoholic beverages"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_GL_POLLUTION",
        standard_name: "Pollution",
        variations: &["pollution exclusion", "total pollution", "contaminants"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_GL_PROFESSIONAL",
        standard_name: "Professional Services",
        variations: &["professional services", "professional liability", "errors and omissions"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_GL_DAMAGE_TO_YOUR_WORK",
        standard_name: "Damage To Your Work",
        variations: &["damage to your work", "your work", "faulty workmanship"],
        category: CoverageCategory::GeneralLiability,
        iso_form: Some("CG 00 01"),
    },
    TaxonomyEntry {
        canonical_id: "EXCL_SUBROGATION_TRANSFER",
        standard_name: "Transfer Of Rights Of Recovery Against Others",
        variations: &[
            "transfer of rights of recovery",
            "transfer of rights",
            "recovery against others",
            "waiver of subrogation",
            "subrogation",
        ],
        category: CoverageCategory::Unknown,
        iso_form: None,
    },
];

fn lookup(taxonomy: &[TaxonomyEntry], name: &str) -> Option<&'static str> {
    let normalized = normalize_key(name);
    if normalized.is_empty() {
        return None;
    }

    // Exact match against the standard name or any variation.
    for entry in taxonomy {
        if normalize_key(entry.standard_name) == normalized {
            return Some(entry.canonical_id);
        }
        for variation in entry.variations {
            if normalize_key(variation) == normalized {
                return Some(entry.canonical_id);
            }
        }
    }

    // Containment match, scored by length ratio.
    let mut best: Option<(&'static str, f64)> = None;
    for entry in taxonomy {
        for candidate in std::iter::once(entry.standard_name).chain(entry.variations.iter().copied())
        {
            let variation = normalize_key(candidate);
            if variation.is_empty() {
                continue;
            }
            if variation.contains(&normalized) || normalized.contains(&variation) {
                let score = variation.len().min(normalized.len()) as f64
                    / variation.len().max(normalized.len()) as f64;
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((entry.canonical_id, score));
                }
            }
        }
    }

    best.filter(|(_, score)| *score >= 0.5).map(|(id, _)| id)
}

/// Canonical id of a coverage name, when the taxonomy knows it.
#[must_use]
pub fn canonical_coverage_id(name: &str) -> Option<&'static str> {
    lookup(COVERAGE_TAXONOMY, name)
}

/// Canonical id of an exclusion name, when the taxonomy knows it.
#[must_use]
pub fn canonical_exclusion_id(name: &str) -> Option<&'static str> {
    lookup(EXCLUSION_TAXONOMY, name)
}

/// Generates the canonical id for a provision: taxonomy lookup first, slug
/// of the normalised name otherwise.
#[must_use]
pub fn generate_canonical_id(name: &str, is_exclusion: bool, category: CoverageCategory) -> String {
    let from_taxonomy = if is_exclusion {
        canonical_exclusion_id(name)
    } else {
        canonical_coverage_id(name)
    };
    if let Some(id) = from_taxonomy {
        return id.to_owned();
    }

    let body: String = normalize_key(name).replace(' ', "_").chars().take(50).collect();
    let prefix = if is_exclusion { "excl" } else { "cov" };
    if category == CoverageCategory::Unknown {
        format!("{prefix}_{body}")
    } else {
        format!("{prefix}_{}_{body}", category.tag())
    }
}

/// Infers the coverage category from a name.
#[must_use]
pub fn coverage_category(name: &str) -> CoverageCategory {
    if let Some(id) = canonical_coverage_id(name) {
        if let Some(entry) = COVERAGE_TAXONOMY.iter().find(|e| e.canonical_id == id) {
            return entry.category;
        }
    }

    let lower = name.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if any(&["auto", "vehicle", "car", "motor"]) {
        CoverageCategory::Auto
    } else if any(&["general liability", "premises", "products", "gl"]) {
        CoverageCategory::GeneralLiability
    } else if any(&["workers", "compensation", "employers liability"]) {
        CoverageCategory::WorkersComp
    } else if any(&["property", "building", "business personal"]) {
        CoverageCategory::Property
    } else if any(&["umbrella", "excess"]) {
        CoverageCategory::Umbrella
    } else if any(&["professional", "errors"]) {
        CoverageCategory::Professional
    } else if any(&["cyber", "privacy", "data"]) {
        CoverageCategory::Cyber
    } else if any(&["inland", "marine", "equipment"]) {
        CoverageCategory::InlandMarine
    } else {
        CoverageCategory::Unknown
    }
}

/// Standard name for a canonical id, when the taxonomy knows it.
#[must_use]
pub fn standard_name(canonical_id: &str) -> Option<&'static str> {
    COVERAGE_TAXONOMY
        .iter()
        .chain(EXCLUSION_TAXONOMY.iter())
        .find(|e| e.canonical_id == canonical_id)
        .map(|e| e.standard_name)
}
