//! Table capture: structural preference, markdown fallback.

use bindery_core::{
    DocumentId, Page, TableCell, TableExtractionSource, TableId, TableJson,
};
use tracing::debug;

/// Captures tables from OCR'd pages.
#[derive(Debug, Clone, Default)]
pub struct TableCapture;

impl TableCapture {
    /// Creates a capture service.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Captures all tables on the given pages.
    ///
    /// Structural tables recorded in page metadata win; markdown parsing
    /// only runs for pages that flagged tables but carried no structural
    /// capture. The `extraction_source` field records which path was used.
    #[must_use]
    pub fn capture(&self, document_id: DocumentId, pages: &[Page]) -> Vec<TableJson> {
        let mut tables = Vec::new();
        for page in pages {
            if !page.metadata.structural_tables.is_empty() {
                tables.extend(page.metadata.structural_tables.iter().cloned());
                continue;
            }
            if !page.metadata.has_tables {
                continue;
            }
            let parsed = parse_markdown_tables(document_id, page.page_number, &page.markdown);
            debug!(
                page = page.page_number,
                tables = parsed.len(),
                "markdown table fallback"
            );
            tables.extend(parsed);
        }
        tables
    }
}

/// Parses pipe-delimited markdown tables into cell grids.
///
/// A table is a run of `|`-framed rows whose second row is a separator.
/// Rows are padded to the header width so the grid stays
/// position-complete.
#[must_use]
pub fn parse_markdown_tables(
    document_id: DocumentId,
    page_number: u32,
    markdown: &str,
) -> Vec<TableJson> {
    let mut tables = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    let flush = |block: &mut Vec<&str>, tables: &mut Vec<TableJson>| {
        if block.len() >= 3 {
            let index = tables.len() as u32;
            if let Some(table) = table_from_block(document_id, page_number, index, block) {
                tables.push(table);
            }
        }
        block.clear();
    };

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 1 {
            block.push(trimmed);
        } else {
            flush(&mut block, &mut tables);
        }
    }
    flush(&mut block, &mut tables);

    tables
}

fn is_separator_row(row: &str) -> bool {
    row.trim_matches('|')
        .chars()
        .all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

fn split_row(row: &str) -> Vec<String> {
    row.trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_owned())
        .collect()
}

fn table_from_block(
    document_id: DocumentId,
    page_number: u32,
    table_index: u32,
    block: &[&str],
) -> Option<TableJson> {
    if !is_separator_row(block.get(1)?) {
        return None;
    }

    let header = split_row(block[0]);
    let num_cols = header.len() as u32;
    if num_cols == 0 {
        return None;
    }

    let mut cells: Vec<TableCell> = header
        .into_iter()
        .enumerate()
        .map(|(col, text)| TableCell::new(0, col as u32, text).header())
        .collect();

    let mut row_index = 1u32;
    for raw in &block[2..] {
        if is_separator_row(raw) {
            continue;
        }
        let mut row = split_row(raw);
        row.resize(num_cols as usize, String::new());
        row.truncate(num_cols as usize);
        for (col, text) in row.into_iter().enumerate() {
            cells.push(TableCell::new(row_index, col as u32, text));
        }
        row_index += 1;
    }

    let raw_markdown = block.join("\n");
    Some(TableJson {
        table_id: TableId::derive(document_id, page_number, table_index),
        page_number,
        table_index,
        bbox: None,
        cells,
        header_rows: 1,
        num_rows: row_index,
        num_cols,
        extraction_source: TableExtractionSource::Markdown,
        confidence: 0.6,
        raw_markdown: Some(raw_markdown),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOV_MD: &str = "\
| Loc # | Address | Building Value | TIV |
|---|---|---|---|
| 1 | 10 Main St | 1,000,000 | 1,500,000 |
| 2 | 22 Oak Ave | 750,000 | 900,000 |";

    #[test]
    fn markdown_table_parses_into_complete_grid() {
        let tables = parse_markdown_tables(DocumentId::generate(), 4, SOV_MD);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.num_rows, 3);
        assert_eq!(table.num_cols, 4);
        assert!(table.is_grid_complete());
        assert_eq!(table.extraction_source, TableExtractionSource::Markdown);
        assert_eq!(table.headers(), vec!["Loc #", "Address", "Building Value", "TIV"]);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let md = "| A | B | C |\n|---|---|---|\n| 1 | 2 |";
        let tables = parse_markdown_tables(DocumentId::generate(), 1, md);
        assert_eq!(tables.len(), 1);
        assert!(tables[0].is_grid_complete());
        assert_eq!(tables[0].body_rows()[0], vec!["1", "2", ""]);
    }

    #[test]
    fn structural_tables_win_over_markdown() {
        let doc = DocumentId::generate();
        let mut page = Page::new(doc, 1, "text", SOV_MD);
        page.metadata.has_tables = true;
        let structural = parse_markdown_tables(doc, 1, SOV_MD)
            .into_iter()
            .map(|mut t| {
                t.extraction_source = TableExtractionSource::Structural;
                t
            })
            .collect();
        page.metadata.structural_tables = structural;

        let tables = TableCapture::new().capture(doc, &[page]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].extraction_source, TableExtractionSource::Structural);
    }

    #[test]
    fn pages_without_tables_yield_nothing() {
        let doc = DocumentId::generate();
        let page = Page::new(doc, 1, "prose", "prose");
        assert!(TableCapture::new().capture(doc, &[page]).is_empty());
    }
}
