//! Per-entity attribute schemas used by the synthesis strategies.

use std::collections::BTreeMap;

use bindery_core::EntityType;
use serde_json::Value;

/// Allowed attribute names per entity type. Strategies drop anything a
/// destination type does not know; field-name variants are mapped to these
/// canonical names before validation.
#[must_use]
pub fn allowed_attributes(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Policy => &[
            "policy_number",
            "effective_date",
            "expiration_date",
            "total_premium",
            "carrier",
            "line_of_business",
            "policy_type",
        ],
        EntityType::Organization => &["role", "address", "fein", "contact", "naic_code"],
        EntityType::Coverage => &[
            "limit",
            "sublimit",
            "deductible",
            "premium",
            "form_reference",
            "scope",
            "territory",
        ],
        EntityType::Condition => &["applies_to", "requirement", "form_section"],
        EntityType::Exclusion => &[
            "scope",
            "impacted_coverage",
            "exceptions",
            "severity",
            "form_section",
            "provision_number",
        ],
        EntityType::Endorsement => &[
            "endorsement_number",
            "endorsement_type",
            "impacted_coverage",
            "materiality",
            "edition_date",
            "page_numbers",
            "source_text",
        ],
        EntityType::Location => &["address", "location_number", "building_count", "occupancy"],
        EntityType::Claim => &["claim_number", "loss_date", "incurred", "paid", "status", "cause"],
        EntityType::Definition => &["definition", "term"],
        EntityType::Form => &["form_number", "edition_date", "form_name"],
        EntityType::Vehicle => &["vin", "year", "make", "model", "value"],
        EntityType::Driver => &["license_number", "date_of_birth", "state"],
        EntityType::Limit => &["amount", "basis", "applies_to"],
        EntityType::Deductible => &["amount", "basis", "applies_to"],
        EntityType::EffectiveDate | EntityType::ExpirationDate => &[],
    }
}

/// Canonical spelling for common field-name variants.
#[must_use]
pub fn canonical_field_name(raw: &str) -> String {
    let folded = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match folded.as_str() {
        "pol_no" | "policy_no" | "policyno" | "policy_num" => "policy_number".to_owned(),
        "insured" | "insured_name" | "named_insured" => "name".to_owned(),
        "eff_date" | "effective" | "inception_date" => "effective_date".to_owned(),
        "exp_date" | "expiration" | "expiry_date" => "expiration_date".to_owned(),
        "premium_amount" | "annual_premium" => "total_premium".to_owned(),
        "limit_of_liability" | "limit_of_insurance" => "limit".to_owned(),
        "endorsement_no" | "endt_number" | "endt_no" => "endorsement_number".to_owned(),
        "form" | "form_ref" => "form_reference".to_owned(),
        _ => folded,
    }
}

/// Filters `raw` down to the attributes `entity_type` knows, renaming
/// variant field names along the way. Null values are dropped.
#[must_use]
pub fn validate_attributes(
    entity_type: EntityType,
    raw: &serde_json::Map<String, Value>,
) -> BTreeMap<String, Value> {
    let allowed = allowed_attributes(entity_type);
    let mut out = BTreeMap::new();
    for (key, value) in raw {
        if value.is_null() {
            continue;
        }
        let canonical = canonical_field_name(key);
        if allowed.contains(&canonical.as_str()) {
            out.insert(canonical, value.clone());
        }
    }
    out
}
