//! SOV and loss-run normalisation into typed domain rows.

use bindery_core::{DocumentId, LossRunClaim, SovItem, TableJson};
use chrono::NaiveDate;
use tracing::warn;

/// Result of normalising one table: the typed rows plus per-row warnings
/// for items skipped on schema mismatch.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome<T> {
    /// Successfully normalised rows.
    pub rows: Vec<T>,
    /// Human-readable skip reasons, one per rejected row.
    pub warnings: Vec<String>,
}

/// Normalises `property_sov` tables into [`SovItem`] rows.
#[derive(Debug, Clone, Default)]
pub struct SovNormalizer;

/// Canonical SOV columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SovColumn {
    LocationNumber,
    Address,
    BuildingValue,
    ContentsValue,
    BusinessIncome,
    TotalInsuredValue,
    Construction,
    Occupancy,
    YearBuilt,
    SquareFeet,
}

fn sov_column(header: &str) -> Option<SovColumn> {
    let h = header.trim().to_lowercase();
    let has = |needle: &str| h.contains(needle);
    if h == "loc" || has("loc #") || has("loc#") || has("location number") || h == "location" {
        Some(SovColumn::LocationNumber)
    } else if has("address") || has("location address") {
        Some(SovColumn::Address)
    } else if has("building") && !has("year") {
        Some(SovColumn::BuildingValue)
    } else if has("contents") || has("business personal property") || h == "bpp" {
        Some(SovColumn::ContentsValue)
    } else if has("business income") || h == "bi" || has("extra expense") {
        Some(SovColumn::BusinessIncome)
    } else if has("tiv") || has("total insured value") || has("total value") || h == "total" {
        Some(SovColumn::TotalInsuredValue)
    } else if has("construction") {
        Some(SovColumn::Construction)
    } else if has("occupancy") {
        Some(SovColumn::Occupancy)
    } else if has("year built") {
        Some(SovColumn::YearBuilt)
    } else if has("square feet") || has("sq ft") {
        Some(SovColumn::SquareFeet)
    } else {
        None
    }
}

impl SovNormalizer {
    /// Creates a normaliser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Normalises a classified SOV table.
    ///
    /// Rows violating domain invariants (negative total insured value,
    /// nothing recognisable at all) are skipped with a warning; the rest
    /// proceed.
    #[must_use]
    pub fn normalize(&self, document_id: DocumentId, table: &TableJson) -> NormalizeOutcome<SovItem> {
        let mapping: Vec<Option<SovColumn>> =
            table.headers().iter().map(|h| sov_column(h)).collect();
        let mut rows = Vec::new();
        let mut warnings = Vec::new();

        for (row_index, row) in table.body_rows().into_iter().enumerate() {
            let mut item = SovItem {
                document_id: Some(document_id),
                table_id: Some(table.table_id.clone()),
                ..SovItem::default()
            };
            let mut any = false;
            for (cell, column) in row.iter().zip(&mapping) {
                let Some(column) = column else { continue };
                if cell.trim().is_empty() {
                    continue;
                }
                any = true;
                match column {
                    SovColumn::LocationNumber => item.location_number = Some(cell.trim().to_owned()),
                    SovColumn::Address => item.address = Some(cell.trim().to_owned()),
                    SovColumn::BuildingValue => item.building_value = parse_money(cell),
                    SovColumn::ContentsValue => item.contents_value = parse_money(cell),
                    SovColumn::BusinessIncome => item.business_income = parse_money(cell),
                    SovColumn::TotalInsuredValue => item.total_insured_value = parse_money(cell),
                    SovColumn::Construction => item.construction = Some(cell.trim().to_owned()),
                    SovColumn::Occupancy => item.occupancy = Some(cell.trim().to_owned()),
                    SovColumn::YearBuilt => item.year_built = cell.trim().parse().ok(),
                    SovColumn::SquareFeet => item.square_feet = parse_money(cell),
                }
            }

            if !any {
                warnings.push(format!("row {row_index}: no recognisable SOV fields"));
                continue;
            }
            if let Some(tiv) = item.total_insured_value {
                if tiv < 0.0 {
                    warnings.push(format!("row {row_index}: negative TIV {tiv}"));
                    continue;
                }
            }
            rows.push(item);
        }

        for warning in &warnings {
            warn!(table = %table.table_id, "{warning}");
        }
        NormalizeOutcome { rows, warnings }
    }
}

/// Normalises `loss_run` tables into [`LossRunClaim`] rows.
#[derive(Debug, Clone, Default)]
pub struct LossRunNormalizer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LossColumn {
    ClaimNumber,
    LossDate,
    Cause,
    Status,
    Paid,
    Reserved,
    Incurred,
    Claimant,
}

fn loss_column(header: &str) -> Option<LossColumn> {
    let h = header.trim().to_lowercase();
    let has = |needle: &str| h.contains(needle);
    if has("claim #") || has("claim number") || h == "claim" {
        Some(LossColumn::ClaimNumber)
    } else if has("loss date") || has("date of loss") {
        Some(LossColumn::LossDate)
    } else if has("cause") {
        Some(LossColumn::Cause)
    } else if has("status") {
        Some(LossColumn::Status)
    } else if has("paid") {
        Some(LossColumn::Paid)
    } else if has("reserve") {
        Some(LossColumn::Reserved)
    } else if has("incurred") {
        Some(LossColumn::Incurred)
    } else if has("claimant") {
        Some(LossColumn::Claimant)
    } else {
        None
    }
}

impl LossRunNormalizer {
    /// Creates a normaliser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Normalises a classified loss-run table. Rows whose loss date cannot
    /// be parsed keep `loss_date = None`; rows with nothing recognisable
    /// are skipped with a warning.
    #[must_use]
    pub fn normalize(
        &self,
        document_id: DocumentId,
        table: &TableJson,
    ) -> NormalizeOutcome<LossRunClaim> {
        let mapping: Vec<Option<LossColumn>> =
            table.headers().iter().map(|h| loss_column(h)).collect();
        let mut rows = Vec::new();
        let mut warnings = Vec::new();

        for (row_index, row) in table.body_rows().into_iter().enumerate() {
            let mut claim = LossRunClaim {
                document_id: Some(document_id),
                table_id: Some(table.table_id.clone()),
                ..LossRunClaim::default()
            };
            let mut any = false;
            for (cell, column) in row.iter().zip(&mapping) {
                let Some(column) = column else { continue };
                let value = cell.trim();
                if value.is_empty() {
                    continue;
                }
                any = true;
                match column {
                    LossColumn::ClaimNumber => claim.claim_number = Some(value.to_owned()),
                    LossColumn::LossDate => claim.loss_date = parse_date(value),
                    LossColumn::Cause => claim.cause = Some(value.to_owned()),
                    LossColumn::Status => claim.status = Some(value.to_owned()),
                    LossColumn::Paid => claim.paid = parse_money(value),
                    LossColumn::Reserved => claim.reserved = parse_money(value),
                    LossColumn::Incurred => claim.incurred = parse_money(value),
                    LossColumn::Claimant => claim.claimant = Some(value.to_owned()),
                }
            }

            if any {
                rows.push(claim);
            } else {
                warnings.push(format!("row {row_index}: no recognisable loss-run fields"));
            }
        }

        for warning in &warnings {
            warn!(table = %table.table_id, "{warning}");
        }
        NormalizeOutcome { rows, warnings }
    }
}

/// Parses a currency-ish cell: `$1,234,567.89`, `(500)` as negative,
/// plain numbers.
#[must_use]
pub fn parse_money(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().map(|v| if negative { -v } else { v })
}

/// Parses a date in the formats loss runs actually use.
#[must_use]
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let value = cell.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d-%m-%Y", "%d.%m.%Y", "%B %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::parse_markdown_tables;

    fn table(md: &str) -> TableJson {
        parse_markdown_tables(DocumentId::generate(), 1, md)
            .pop()
            .unwrap()
    }

    #[test]
    fn sov_rows_normalise_with_money_parsing() {
        let t = table(
            "| Loc # | Address | Building Value | TIV |\n|---|---|---|---|\n\
             | 1 | 10 Main St | $1,000,000 | $1,500,000 |",
        );
        let outcome = SovNormalizer::new().normalize(DocumentId::generate(), &t);
        assert_eq!(outcome.rows.len(), 1);
        let item = &outcome.rows[0];
        assert_eq!(item.location_number.as_deref(), Some("1"));
        assert_eq!(item.building_value, Some(1_000_000.0));
        assert_eq!(item.total_insured_value, Some(1_500_000.0));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn negative_tiv_rows_are_skipped() {
        let t = table(
            "| Loc # | TIV |\n|---|---|\n| 1 | (500,000) |\n| 2 | 900,000 |",
        );
        let outcome = SovNormalizer::new().normalize(DocumentId::generate(), &t);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.rows[0].total_insured_value, Some(900_000.0));
    }

    #[test]
    fn loss_run_rows_normalise_with_dates() {
        let t = table(
            "| Claim Number | Date of Loss | Paid | Status |\n|---|---|---|---|\n\
             | CLM-1 | 03/15/2023 | $12,500 | Closed |",
        );
        let outcome = LossRunNormalizer::new().normalize(DocumentId::generate(), &t);
        assert_eq!(outcome.rows.len(), 1);
        let claim = &outcome.rows[0];
        assert_eq!(claim.claim_number.as_deref(), Some("CLM-1"));
        assert_eq!(
            claim.loss_date,
            NaiveDate::from_ymd_opt(2023, 3, 15)
        );
        assert_eq!(claim.paid, Some(12_500.0));
    }

    #[test]
    fn date_formats_cover_iso_us_eu_and_month_name() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("1/15/2024").is_some());
        assert!(parse_date("15-01-2024").is_some());
        assert!(parse_date("January 15, 2024").is_some());
        assert!(parse_date("not a date").is_none());
    }
}
