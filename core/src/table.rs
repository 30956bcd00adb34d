//! Tables captured from documents and their typed normalisations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::id::{DocumentId, TableId};

/// One cell of a structural table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
    /// Cell text.
    pub text: String,
    /// Rows spanned.
    pub row_span: u32,
    /// Columns spanned.
    pub col_span: u32,
    /// Whether the cell belongs to a header row.
    pub is_header: bool,
}

impl TableCell {
    /// Creates a 1×1 body cell.
    #[must_use]
    pub fn new(row: u32, col: u32, text: impl Into<String>) -> Self {
        Self {
            row,
            col,
            text: text.into(),
            row_span: 1,
            col_span: 1,
            is_header: false,
        }
    }

    /// Marks the cell as a header cell.
    #[must_use]
    pub fn header(mut self) -> Self {
        self.is_header = true;
        self
    }
}

/// Which extraction path produced a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableExtractionSource {
    /// Cells taken from the parser's structural output.
    Structural,
    /// Cells recovered from markdown pipe rows.
    Markdown,
}

impl TableExtractionSource {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Markdown => "markdown",
        }
    }
}

/// A captured table in cell-grid form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableJson {
    /// Stable derived identifier.
    pub table_id: TableId,
    /// Page the table appears on.
    pub page_number: u32,
    /// Index of the table within the page, 0-based.
    pub table_index: u32,
    /// Bounding box `[x0, y0, x1, y1]` in page points, when known.
    pub bbox: Option<[f32; 4]>,
    /// Cell grid.
    pub cells: Vec<TableCell>,
    /// Number of header rows.
    pub header_rows: u32,
    /// Row count.
    pub num_rows: u32,
    /// Column count.
    pub num_cols: u32,
    /// Which path captured the table.
    pub extraction_source: TableExtractionSource,
    /// Capture confidence in `[0, 1]`.
    pub confidence: f32,
    /// Raw markdown fallback, kept when the source is markdown.
    pub raw_markdown: Option<String>,
}

impl TableJson {
    /// Header texts in column order, taken from the first header row.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<(u32, String)> = self
            .cells
            .iter()
            .filter(|c| c.is_header && c.row == 0)
            .map(|c| (c.col, c.text.clone()))
            .collect();
        headers.sort_by_key(|(col, _)| *col);
        headers.into_iter().map(|(_, text)| text).collect()
    }

    /// Body rows as ordered cell-text vectors.
    #[must_use]
    pub fn body_rows(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        for row in self.header_rows..self.num_rows {
            let mut cells: Vec<(u32, String)> = self
                .cells
                .iter()
                .filter(|c| c.row == row)
                .map(|c| (c.col, c.text.clone()))
                .collect();
            cells.sort_by_key(|(col, _)| *col);
            rows.push(cells.into_iter().map(|(_, text)| text).collect());
        }
        rows
    }

    /// Whether the cell grid is position-complete: every `(row, col)`
    /// position inside the declared bounds is covered exactly once.
    #[must_use]
    pub fn is_grid_complete(&self) -> bool {
        self.cells.len() as u64 == u64::from(self.num_rows) * u64::from(self.num_cols)
    }
}

/// Domain classification of a captured table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Statement of values (property schedule).
    PropertySov,
    /// Loss-run claims listing.
    LossRun,
    /// Inland marine equipment schedule.
    InlandMarineSchedule,
    /// Vehicle schedule.
    AutoSchedule,
    /// Premium breakdown.
    PremiumSchedule,
    /// Anything else; stored raw, not normalised.
    Other,
}

impl TableKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PropertySov => "property_sov",
            Self::LossRun => "loss_run",
            Self::InlandMarineSchedule => "inland_marine_schedule",
            Self::AutoSchedule => "auto_schedule",
            Self::PremiumSchedule => "premium_schedule",
            Self::Other => "other",
        }
    }
}

/// Classification result for a table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableClassification {
    /// The classified table.
    pub table_id: TableId,
    /// Assigned kind.
    pub kind: TableKind,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
    /// Human-readable reasoning for the decision.
    pub reasoning: String,
}

/// A normalised statement-of-values row.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SovItem {
    /// Owning document.
    pub document_id: Option<DocumentId>,
    /// Source table.
    pub table_id: Option<TableId>,
    /// Location number as printed.
    pub location_number: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Building value.
    pub building_value: Option<f64>,
    /// Contents / business personal property value.
    pub contents_value: Option<f64>,
    /// Business income value.
    pub business_income: Option<f64>,
    /// Total insured value. Never negative once validated.
    pub total_insured_value: Option<f64>,
    /// Construction class.
    pub construction: Option<String>,
    /// Occupancy description.
    pub occupancy: Option<String>,
    /// Year built.
    pub year_built: Option<i32>,
    /// Square footage.
    pub square_feet: Option<f64>,
}

/// A normalised loss-run claim row.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LossRunClaim {
    /// Owning document.
    pub document_id: Option<DocumentId>,
    /// Source table.
    pub table_id: Option<TableId>,
    /// Claim number as printed.
    pub claim_number: Option<String>,
    /// Date of loss.
    pub loss_date: Option<NaiveDate>,
    /// Cause of loss.
    pub cause: Option<String>,
    /// Claim status (open/closed).
    pub status: Option<String>,
    /// Amount paid.
    pub paid: Option<f64>,
    /// Amount reserved.
    pub reserved: Option<f64>,
    /// Total incurred.
    pub incurred: Option<f64>,
    /// Claimant name.
    pub claimant: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_table() -> TableJson {
        let mut cells = Vec::new();
        for col in 0..3u32 {
            cells.push(TableCell::new(0, col, format!("h{col}")).header());
        }
        for row in 1..3u32 {
            for col in 0..3u32 {
                cells.push(TableCell::new(row, col, format!("r{row}c{col}")));
            }
        }
        TableJson {
            table_id: TableId::derive(DocumentId::generate(), 1, 0),
            page_number: 1,
            table_index: 0,
            bbox: None,
            cells,
            header_rows: 1,
            num_rows: 3,
            num_cols: 3,
            extraction_source: TableExtractionSource::Structural,
            confidence: 0.9,
            raw_markdown: None,
        }
    }

    #[test]
    fn headers_come_back_in_column_order() {
        assert_eq!(grid_table().headers(), vec!["h0", "h1", "h2"]);
    }

    #[test]
    fn body_rows_exclude_headers() {
        let rows = grid_table().body_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "r1c0");
    }

    #[test]
    fn complete_grid_satisfies_cell_count_law() {
        assert!(grid_table().is_grid_complete());
    }
}
