//! Entity synthesis: strategy per section type.
//!
//! Each strategy reads a section's extracted fields and emits typed domain
//! entities with slugified document-local identifiers. This is the single
//! place where document-local identifiers are minted. Strategies accept
//! both the `{"entities": [...]}` shape and the section's raw-data shape,
//! and validate attributes against the destination type's schema.

use bindery_core::text::slugify;
use bindery_core::{EntityMention, EntityType, MentionSource, SectionType};
use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::validate_attributes;

/// Synthesises domain entities from section extraction data.
#[derive(Debug, Clone, Default)]
pub struct EntitySynthesizer;

impl EntitySynthesizer {
    /// Creates a synthesizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs the section's strategy over its extracted data.
    #[must_use]
    pub fn synthesize(
        &self,
        section: SectionType,
        data: &Value,
        confidence: f32,
    ) -> Vec<EntityMention> {
        let mut out = match section {
            SectionType::Declarations => declarations(data, confidence),
            SectionType::Coverages | SectionType::InsuringAgreement => {
                items(data, &["coverages", "insuring_agreements"], EntityType::Coverage, "cov", confidence)
            }
            SectionType::Conditions => {
                items(data, &["conditions"], EntityType::Condition, "cond", confidence)
            }
            SectionType::Exclusions => {
                items(data, &["exclusions"], EntityType::Exclusion, "excl", confidence)
            }
            SectionType::Endorsements => endorsements(data, confidence),
            SectionType::Definitions => {
                items(data, &["definitions"], EntityType::Definition, "def", confidence)
            }
            SectionType::PremiumSummary => {
                items(data, &["premiums", "line_items"], EntityType::Coverage, "cov", confidence)
            }
            SectionType::Schedule => schedule(data, confidence),
            SectionType::LossRun => items(data, &["claims"], EntityType::Claim, "claim", confidence),
            SectionType::Other => Vec::new(),
        };

        // The generic shape supplements whatever the raw shape yielded.
        out.extend(generic_entities(data, confidence));
        debug!(section = section.as_str(), entities = out.len(), "entities synthesised");
        out
    }
}

/// Builds one mention with a minted identifier and validated attributes.
fn make_mention(
    entity_type: EntityType,
    prefix: &str,
    name: &str,
    raw_attrs: &Map<String, Value>,
    confidence: f32,
) -> EntityMention {
    let mut mention = EntityMention::new(
        entity_type,
        name,
        name,
        confidence,
        MentionSource::Llm,
    );
    mention.identifier = Some(slugify(prefix, name));
    mention.attributes = validate_attributes(entity_type, raw_attrs);
    mention
}

/// Pulls a display name out of an item, trying the common variants.
fn item_name(item: &Map<String, Value>, kind_hint: &str) -> Option<String> {
    let keys = [
        "name".to_owned(),
        format!("{kind_hint}_name"),
        "title".to_owned(),
        "term".to_owned(),
        "provision_name".to_owned(),
        "text".to_owned(),
        "description".to_owned(),
    ];
    for key in &keys {
        if let Some(value) = item.get(key.as_str()).and_then(Value::as_str) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.chars().take(200).collect());
            }
        }
    }
    None
}

fn as_items<'a>(data: &'a Value, keys: &[&str]) -> Vec<&'a Map<String, Value>> {
    for key in keys {
        if let Some(array) = data.get(*key).and_then(Value::as_array) {
            return array.iter().filter_map(Value::as_object).collect();
        }
    }
    Vec::new()
}

fn items(
    data: &Value,
    keys: &[&str],
    entity_type: EntityType,
    prefix: &str,
    confidence: f32,
) -> Vec<EntityMention> {
    let kind_hint = entity_type.as_str();
    as_items(data, keys)
        .into_iter()
        .filter_map(|item| {
            item_name(item, kind_hint).map(|name| {
                make_mention(entity_type, prefix, &name, item, confidence)
            })
        })
        .collect()
}

/// Declarations mint the policy itself plus insured and carrier parties.
fn declarations(data: &Value, confidence: f32) -> Vec<EntityMention> {
    let Some(object) = data.as_object() else {
        return Vec::new();
    };
    let mut out = Vec::new();

    let field = |names: &[&str]| -> Option<String> {
        names.iter().find_map(|n| {
            object
                .get(*n)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
    };

    let policy_number = field(&["policy_number", "pol_no", "policy_no"]);
    let insured = field(&["named_insured", "insured_name", "insured"]);
    let carrier = field(&["carrier", "insurer", "company"]);

    if policy_number.is_some() || insured.is_some() {
        let display = policy_number
            .clone()
            .or_else(|| insured.clone())
            .unwrap_or_else(|| "policy".to_owned());
        let mut mention = make_mention(EntityType::Policy, "policy", &display, object, confidence);
        if let Some(number) = &policy_number {
            mention
                .attributes
                .insert("policy_number".to_owned(), Value::String(number.clone()));
        }
        out.push(mention);
    }

    if let Some(name) = insured {
        let mut mention = make_mention(EntityType::Organization, "org", &name, object, confidence);
        mention.attributes.clear();
        mention
            .attributes
            .insert("role".to_owned(), Value::String("insured".to_owned()));
        out.push(mention);
    }

    if let Some(name) = carrier {
        let mut mention = make_mention(EntityType::Organization, "org", &name, object, confidence);
        mention.attributes.clear();
        mention
            .attributes
            .insert("role".to_owned(), Value::String("carrier".to_owned()));
        out.push(mention);
    }

    out
}

/// Endorsements also mint form entities when a form number is present.
fn endorsements(data: &Value, confidence: f32) -> Vec<EntityMention> {
    let mut out = Vec::new();
    for item in as_items(data, &["endorsements"]) {
        let Some(name) = item_name(item, "endorsement") else {
            continue;
        };
        out.push(make_mention(EntityType::Endorsement, "endt", &name, item, confidence));

        if let Some(form) = item
            .get("form_number")
            .or_else(|| item.get("endorsement_number"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let mut form_attrs = Map::new();
            form_attrs.insert("form_number".to_owned(), Value::String(form.to_owned()));
            out.push(make_mention(EntityType::Form, "form", form, &form_attrs, confidence));
        }
    }
    out
}

/// Schedules carry locations, vehicles, or drivers depending on the table.
fn schedule(data: &Value, confidence: f32) -> Vec<EntityMention> {
    let mut out = Vec::new();
    out.extend(items(data, &["locations"], EntityType::Location, "loc", confidence));
    out.extend(items(data, &["vehicles"], EntityType::Vehicle, "veh", confidence));
    out.extend(items(data, &["drivers"], EntityType::Driver, "drv", confidence));
    out
}

/// The `{"entities": [...]}` shape: each item names its own type.
fn generic_entities(data: &Value, confidence: f32) -> Vec<EntityMention> {
    let mut out = Vec::new();
    for item in as_items(data, &["entities"]) {
        let Some(type_name) = item
            .get("type")
            .or_else(|| item.get("entity_type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let Some(entity_type) = EntityType::parse(type_name) else {
            continue;
        };
        let Some(name) = item_name(item, entity_type.as_str()) else {
            continue;
        };
        let item_confidence = item
            .get("confidence")
            .and_then(Value::as_f64)
            .map_or(confidence, |c| c as f32);
        out.push(make_mention(
            entity_type,
            entity_type.as_str(),
            &name,
            item,
            item_confidence,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declarations_mint_policy_and_parties() {
        let data = json!({
            "policy_number": "POL-123",
            "named_insured": "Acme LLC",
            "carrier": "Travelers",
            "effective_date": "2024-01-01"
        });
        let mentions = EntitySynthesizer::new().synthesize(SectionType::Declarations, &data, 0.85);
        assert_eq!(mentions.len(), 3);

        let policy = mentions.iter().find(|m| m.entity_type == EntityType::Policy).unwrap();
        assert_eq!(policy.identifier.as_deref(), Some("policy_pol_123"));
        assert_eq!(policy.attributes.get("policy_number"), Some(&json!("POL-123")));
        assert_eq!(policy.attributes.get("effective_date"), Some(&json!("2024-01-01")));

        let roles: Vec<_> = mentions
            .iter()
            .filter(|m| m.entity_type == EntityType::Organization)
            .filter_map(|m| m.attributes.get("role").and_then(Value::as_str))
            .collect();
        assert!(roles.contains(&"insured"));
        assert!(roles.contains(&"carrier"));
    }

    #[test]
    fn coverage_items_validate_attributes() {
        let data = json!({
            "coverages": [
                {"name": "Collision", "limit": "$100,000", "made_up_field": 1},
                {"coverage_name": "Comprehensive", "deductible": "$500"}
            ]
        });
        let mentions = EntitySynthesizer::new().synthesize(SectionType::Coverages, &data, 0.8);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].identifier.as_deref(), Some("cov_collision"));
        assert!(mentions[0].attributes.contains_key("limit"));
        assert!(!mentions[0].attributes.contains_key("made_up_field"));
        assert_eq!(mentions[1].raw_value, "Comprehensive");
    }

    #[test]
    fn endorsements_also_mint_forms() {
        let data = json!({
            "endorsements": [
                {"endorsement_name": "Blanket Additional Insured", "endorsement_number": "CA T3 53"}
            ]
        });
        let mentions = EntitySynthesizer::new().synthesize(SectionType::Endorsements, &data, 0.8);
        let types: Vec<EntityType> = mentions.iter().map(|m| m.entity_type).collect();
        assert!(types.contains(&EntityType::Endorsement));
        assert!(types.contains(&EntityType::Form));
    }

    #[test]
    fn generic_entities_shape_is_supported() {
        let data = json!({
            "entities": [
                {"type": "Coverage", "name": "Hired Auto", "confidence": 0.92},
                {"type": "nonsense", "name": "ignored"}
            ]
        });
        let mentions = EntitySynthesizer::new().synthesize(SectionType::Other, &data, 0.5);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].entity_type, EntityType::Coverage);
        assert!((mentions[0].confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn missing_names_are_skipped() {
        let data = json!({"exclusions": [{"severity": "Major"}]});
        let mentions = EntitySynthesizer::new().synthesize(SectionType::Exclusions, &data, 0.8);
        assert!(mentions.is_empty());
    }
}
