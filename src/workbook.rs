//! Local workbook parsing for uploaded audits: CSV and Excel
//! (.xlsx/.xlsm/.xlsb) into [`TabSnapshot`]s.
//!
//! File formats carry no declared grid beyond the used range, so declared
//! dimensions equal the used range here, and chart counts are 0 (not stored
//! in a form calamine exposes). The hosted-service collaborator in
//! `sheets.rs` supplies both.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsb, Xlsx};
use tracing::warn;

use crate::error::AuditError;
use crate::snapshot::{Cell, TabSnapshot};

/// Dispatch file parsing by extension. Returns the document name (file stem)
/// and one snapshot per tab.
pub fn parse_workbook(filename: &str, data: &[u8]) -> Result<(String, Vec<TabSnapshot>), AuditError> {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    let doc_name = file_stem(filename);

    let tabs = match ext.as_str() {
        "csv" => vec![parse_csv(&doc_name, data)?],
        "xlsx" | "xlsm" => {
            let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
                .map_err(|e| AuditError::Decode(format!("failed to open workbook: {}", e)))?;
            excel_snapshots(workbook)
        }
        "xlsb" => {
            let workbook: Xlsb<_> = open_workbook_from_rs(Cursor::new(data))
                .map_err(|e| AuditError::Decode(format!("failed to open workbook: {}", e)))?;
            excel_snapshots(workbook)
        }
        _ => return Err(AuditError::UnsupportedFile { ext }),
    };

    Ok((doc_name, tabs))
}

/// Snapshot every worksheet. Sheets whose ranges cannot be read are skipped
/// with a warning rather than failing the whole audit.
fn excel_snapshots<RS, R>(mut workbook: R) -> Vec<TabSnapshot>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut tabs = Vec::new();

    for name in &sheet_names {
        let values = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping sheet '{}': {}", name, e);
                continue;
            }
        };
        // Not every sheet has formulas; treat a read failure as none.
        let formulas = workbook
            .worksheet_formula(name)
            .unwrap_or_else(|_| Range::empty());

        tabs.push(range_to_snapshot(name, &values, &formulas));
    }

    tabs
}

/// Convert a calamine value range + formula range into one snapshot. The
/// used range is the larger of the two extents; both grids are padded out to
/// it so the extractor sees rectangular input.
fn range_to_snapshot(name: &str, values: &Range<Data>, formulas: &Range<String>) -> TabSnapshot {
    let (vr, vc) = extent(values.end());
    let (fr, fc) = extent(formulas.end());
    let last_row = vr.max(fr);
    let last_col = vc.max(fc);

    let value_grid = (0..last_row)
        .map(|r| {
            (0..last_col)
                .map(|c| {
                    values
                        .get_value((r, c))
                        .map(cell_from_data)
                        .unwrap_or_else(Cell::empty)
                })
                .collect()
        })
        .collect();

    let formula_grid = (0..last_row)
        .map(|r| {
            (0..last_col)
                .map(|c| formulas.get_value((r, c)).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    TabSnapshot {
        name: name.to_string(),
        rows: last_row,
        cols: last_col,
        last_row,
        last_col,
        values: value_grid,
        formulas: formula_grid,
        charts: 0,
    }
}

fn extent(end: Option<(u32, u32)>) -> (u32, u32) {
    match end {
        Some((row, col)) => (row + 1, col + 1),
        None => (0, 0),
    }
}

/// Convert a calamine cell to an audit cell. Empty cells become the empty
/// string so the data-cell deduction rule applies to them; a stored 0 or
/// `false` stays typed and counts as data.
fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::empty(),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#ERR:{:?}", e)),
    }
}

/// Parse a CSV file into a single formula-free snapshot. Ragged rows are
/// padded with empty cells to the widest row.
fn parse_csv(name: &str, data: &[u8]) -> Result<TabSnapshot, AuditError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(data);

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| AuditError::Decode(format!("failed to read CSV record: {}", e)))?;
        rows.push(record.iter().map(|f| Cell::Text(f.to_string())).collect());
    }

    let last_col = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
    for row in &mut rows {
        row.resize(last_col as usize, Cell::empty());
    }
    let last_row = rows.len() as u32;

    let formulas = vec![vec![String::new(); last_col as usize]; last_row as usize];

    Ok(TabSnapshot {
        name: name.to_string(),
        rows: last_row,
        cols: last_col,
        last_row,
        last_col,
        values: rows,
        formulas,
        charts: 0,
    })
}

/// File name without directories or extension.
fn file_stem(filename: &str) -> String {
    let base = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .rsplit('\\')
        .next()
        .unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;

    #[test]
    fn test_parse_csv_basic() {
        let csv_data = b"name,age,city\nAlice,30,SP\nBob,25,RJ\n";
        let (doc, tabs) = parse_workbook("test.csv", csv_data).unwrap();
        assert_eq!(doc, "test");
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].last_row, 3);
        assert_eq!(tabs[0].last_col, 3);
        assert_eq!(tabs[0].charts, 0);
    }

    #[test]
    fn test_parse_csv_ragged_rows_padded() {
        let csv_data = b"a,b,c\n1,2\n";
        let (_, tabs) = parse_workbook("flex.csv", csv_data).unwrap();
        assert_eq!(tabs[0].last_col, 3);
        assert_eq!(tabs[0].values[1][2], Cell::empty());
    }

    #[test]
    fn test_csv_snapshot_feeds_extractor() {
        let csv_data = b"a,,c\n,2,\n";
        let (doc, tabs) = parse_workbook("data.csv", csv_data).unwrap();
        let outcome = extract(&doc, &tabs, 2_000_000, 0.0).unwrap();
        // 6 used cells, 3 empty strings deducted.
        assert_eq!(outcome.tabs[0].data_cells, 3);
        assert_eq!(outcome.tabs[0].cells, 6);
    }

    #[test]
    fn test_empty_csv() {
        let (_, tabs) = parse_workbook("empty.csv", b"").unwrap();
        assert_eq!(tabs[0].used_area(), 0);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_workbook("test.txt", b"data");
        assert!(matches!(
            result,
            Err(AuditError::UnsupportedFile { ext }) if ext == "txt"
        ));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("dir/report.xlsx"), "report");
        assert_eq!(file_stem("c:\\files\\report.2024.csv"), "report.2024");
        assert_eq!(file_stem("plain"), "plain");
    }
}
