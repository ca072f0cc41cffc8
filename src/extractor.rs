//! Metric extraction over already-fetched tab snapshots.
//!
//! Pure functions, no async, no I/O. Access and permission
//! failures belong to the collaborators that build the snapshots; the only
//! failure here is a snapshot whose grids contradict its declared used range.

use serde::Serialize;
use tracing::debug;

use crate::error::AuditError;
use crate::snapshot::TabSnapshot;

/// Derived metrics for a single tab. Document-level aggregates are attached
/// to every record so each output row is self-contained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabMetrics {
    pub name: String,
    /// Declared rows x declared cols.
    pub cells: u64,
    pub rows: u32,
    pub cols: u32,
    /// Used-range cells that hold something other than the empty string.
    pub data_cells: u64,
    pub now_funcs: u64,
    pub today_funcs: u64,
    pub rand_funcs: u64,
    pub randbetween_funcs: u64,
    pub array_funcs: u64,
    pub vlookup_funcs: u64,
    pub charts: u32,
    pub document: DocumentMetrics,
}

/// Aggregates over the whole document, computed once after all tabs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetrics {
    pub file_name: String,
    pub tab_count: u32,
    pub total_cells: u64,
    pub total_data_cells: u64,
    /// `total_cells / capacity_ceiling`, a ratio (0-1), not percentage points.
    pub total_cell_ratio: f64,
    /// `total_data_cells / capacity_ceiling`, a ratio (0-1).
    pub total_data_cell_ratio: f64,
    /// Measured by the caller around the whole fetch+extract operation.
    pub load_time_secs: f64,
}

/// Result of one extract call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditOutcome {
    pub document: DocumentMetrics,
    pub tabs: Vec<TabMetrics>,
}

/// Per-tab formula counters, filled by the used-range scan.
#[derive(Debug, Default)]
struct FormulaCounts {
    now: u64,
    today: u64,
    rand: u64,
    randbetween: u64,
    array: u64,
    vlookup: u64,
}

/// Compute per-tab metrics and document aggregates from captured snapshots.
///
/// `load_time_secs` is supplied by the caller (measured around fetch+extract);
/// the extractor does not measure time itself. Tab order is preserved.
pub fn extract(
    file_name: &str,
    tabs: &[TabSnapshot],
    capacity_ceiling: u64,
    load_time_secs: f64,
) -> Result<AuditOutcome, AuditError> {
    let mut per_tab = Vec::with_capacity(tabs.len());
    let mut total_cells: u64 = 0;
    let mut total_data_cells: u64 = 0;

    for tab in tabs {
        let cells = u64::from(tab.rows) * u64::from(tab.cols);
        let data_cells = count_data_cells(tab)?;
        let funcs = count_formulas(tab)?;

        debug!(
            "tab '{}': {} cells, {} data cells, {} volatile formulas",
            tab.name,
            cells,
            data_cells,
            funcs.now + funcs.today + funcs.rand + funcs.randbetween
        );

        total_cells += cells;
        total_data_cells += data_cells;

        per_tab.push((tab, cells, data_cells, funcs));
    }

    let ceiling = capacity_ceiling as f64;
    let document = DocumentMetrics {
        file_name: file_name.to_string(),
        tab_count: tabs.len() as u32,
        total_cells,
        total_data_cells,
        total_cell_ratio: total_cells as f64 / ceiling,
        total_data_cell_ratio: total_data_cells as f64 / ceiling,
        load_time_secs,
    };

    let tabs = per_tab
        .into_iter()
        .map(|(tab, cells, data_cells, funcs)| TabMetrics {
            name: tab.name.clone(),
            cells,
            rows: tab.rows,
            cols: tab.cols,
            data_cells,
            now_funcs: funcs.now,
            today_funcs: funcs.today,
            rand_funcs: funcs.rand,
            randbetween_funcs: funcs.randbetween,
            array_funcs: funcs.array,
            vlookup_funcs: funcs.vlookup,
            charts: tab.charts,
            document: document.clone(),
        })
        .collect();

    Ok(AuditOutcome { document, tabs })
}

/// Count cells in the used range holding anything other than the empty
/// string. Only the literal empty string deducts; a numeric 0 or `false`
/// still counts as data.
fn count_data_cells(tab: &TabSnapshot) -> Result<u64, AuditError> {
    if tab.used_area() == 0 {
        return Ok(0);
    }
    validate_grid_shape(tab, tab.values.len(), tab.values.iter().map(Vec::len), "value")?;

    let mut counter = tab.used_area();
    for row in &tab.values {
        for cell in row {
            if cell.is_blank() {
                counter -= 1;
            }
        }
    }
    Ok(counter)
}

/// Scan the formula grid for known expensive functions. Skipped entirely
/// when the used range is empty.
///
/// Matches are deliberately substring matches on the upper-cased formula,
/// mirroring the heuristic existing reports were built against: a reference
/// to a range named `MYNOW` still counts as NOW. One cell may increment
/// several counters, except that a RANDBETWEEN cell never also counts as RAND.
fn count_formulas(tab: &TabSnapshot) -> Result<FormulaCounts, AuditError> {
    let mut counts = FormulaCounts::default();
    if tab.used_area() == 0 {
        return Ok(counts);
    }
    validate_grid_shape(
        tab,
        tab.formulas.len(),
        tab.formulas.iter().map(Vec::len),
        "formula",
    )?;

    for row in &tab.formulas {
        for formula in row {
            let upper = formula.to_uppercase();
            if upper.contains("NOW") {
                counts.now += 1;
            }
            if upper.contains("TODAY") {
                counts.today += 1;
            }
            if upper.contains("RAND") && !upper.contains("RANDBETWEEN") {
                counts.rand += 1;
            }
            if upper.contains("RANDBETWEEN") {
                counts.randbetween += 1;
            }
            if upper.contains("ARRAYFORMULA") {
                counts.array += 1;
            }
            if upper.contains("VLOOKUP") {
                counts.vlookup += 1;
            }
        }
    }
    Ok(counts)
}

/// A grid must be exactly `last_row` x `last_col`, and the used range must
/// fit inside the declared dimensions.
fn validate_grid_shape(
    tab: &TabSnapshot,
    row_count: usize,
    col_counts: impl Iterator<Item = usize>,
    grid_name: &str,
) -> Result<(), AuditError> {
    if tab.last_row > tab.rows || tab.last_col > tab.cols {
        return Err(AuditError::InvalidSnapshot {
            tab: tab.name.clone(),
            reason: format!(
                "used range {}x{} exceeds declared dimensions {}x{}",
                tab.last_row, tab.last_col, tab.rows, tab.cols
            ),
        });
    }
    if row_count != tab.last_row as usize {
        return Err(AuditError::InvalidSnapshot {
            tab: tab.name.clone(),
            reason: format!(
                "{} grid has {} rows, declared used range has {}",
                grid_name, row_count, tab.last_row
            ),
        });
    }
    for (i, width) in col_counts.enumerate() {
        if width != tab.last_col as usize {
            return Err(AuditError::InvalidSnapshot {
                tab: tab.name.clone(),
                reason: format!(
                    "{} grid row {} has {} columns, declared used range has {}",
                    grid_name, i, width, tab.last_col
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Cell;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn snapshot(
        name: &str,
        rows: u32,
        cols: u32,
        last_row: u32,
        last_col: u32,
        values: Vec<Vec<Cell>>,
        formulas: Vec<Vec<&str>>,
    ) -> TabSnapshot {
        TabSnapshot {
            name: name.to_string(),
            rows,
            cols,
            last_row,
            last_col,
            values,
            formulas: formulas
                .into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
            charts: 0,
        }
    }

    #[test]
    fn test_empty_used_range_has_zero_data_cells() {
        let tab = snapshot("empty", 1000, 26, 0, 0, vec![], vec![]);
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        assert_eq!(outcome.tabs[0].data_cells, 0);
        assert_eq!(outcome.tabs[0].cells, 26_000);
        assert_eq!(outcome.tabs[0].now_funcs, 0);
    }

    #[test]
    fn test_only_empty_string_deducts() {
        // 2x2 used range: two empty strings deduct from a starting 4.
        let tab = snapshot(
            "data",
            10,
            10,
            2,
            2,
            vec![vec![text(""), text("x")], vec![text("y"), text("")]],
            vec![vec!["", ""], vec!["", ""]],
        );
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        assert_eq!(outcome.tabs[0].data_cells, 2);
    }

    #[test]
    fn test_numeric_zero_and_false_count_as_data() {
        let tab = snapshot(
            "zeros",
            2,
            2,
            2,
            2,
            vec![
                vec![Cell::Number(0.0), Cell::Bool(false)],
                vec![text(""), text("")],
            ],
            vec![vec!["", ""], vec!["", ""]],
        );
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        assert_eq!(outcome.tabs[0].data_cells, 2);
    }

    #[test]
    fn test_randbetween_never_counts_as_rand() {
        let tab = snapshot(
            "vol",
            4,
            1,
            4,
            1,
            vec![vec![text("a")], vec![text("b")], vec![text("c")], vec![text("d")]],
            vec![
                vec!["=RANDBETWEEN(1,10)"],
                vec!["=RAND()"],
                vec!["=rand()*10"],
                vec![""],
            ],
        );
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        let tab = &outcome.tabs[0];
        assert_eq!(tab.randbetween_funcs, 1);
        assert_eq!(tab.rand_funcs, 2);
    }

    #[test]
    fn test_one_cell_can_increment_several_counters() {
        let tab = snapshot(
            "multi",
            1,
            1,
            1,
            1,
            vec![vec![text("x")]],
            vec![vec!["=ARRAYFORMULA(VLOOKUP(NOW(),A:B,2))"]],
        );
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        let tab = &outcome.tabs[0];
        assert_eq!(tab.array_funcs, 1);
        assert_eq!(tab.vlookup_funcs, 1);
        assert_eq!(tab.now_funcs, 1);
        assert_eq!(tab.today_funcs, 0);
    }

    #[test]
    fn test_substring_match_is_preserved() {
        // Looser-than-token matching is part of the contract.
        let tab = snapshot(
            "loose",
            1,
            1,
            1,
            1,
            vec![vec![text("x")]],
            vec![vec!["=MYNOW+1"]],
        );
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        assert_eq!(outcome.tabs[0].now_funcs, 1);
    }

    #[test]
    fn test_document_totals_and_ratios() {
        let a = snapshot("a", 100, 10, 0, 0, vec![], vec![]);
        let b = snapshot("b", 50, 10, 0, 0, vec![], vec![]);
        let outcome = extract("doc", &[a, b], 2_000_000, 1.5).unwrap();
        assert_eq!(outcome.document.total_cells, 1_500);
        assert_eq!(outcome.document.total_cell_ratio, 0.00075);
        assert_eq!(outcome.document.tab_count, 2);
        assert_eq!(outcome.document.load_time_secs, 1.5);
        // Denormalized copy on every tab record.
        assert_eq!(outcome.tabs[0].document, outcome.document);
        assert_eq!(outcome.tabs[1].document, outcome.document);
    }

    #[test]
    fn test_mismatched_grid_is_invalid_snapshot() {
        let tab = snapshot(
            "bad",
            5,
            5,
            2,
            2,
            vec![vec![text("a"), text("b")]], // one row instead of two
            vec![vec!["", ""], vec!["", ""]],
        );
        let err = extract("doc", &[tab], 2_000_000, 0.0).unwrap_err();
        assert!(matches!(err, AuditError::InvalidSnapshot { .. }));
    }

    #[test]
    fn test_used_range_beyond_declared_is_invalid() {
        let tab = snapshot(
            "bad",
            1,
            1,
            2,
            2,
            vec![vec![text("a"), text("b")], vec![text("c"), text("d")]],
            vec![vec!["", ""], vec!["", ""]],
        );
        let err = extract("doc", &[tab], 2_000_000, 0.0).unwrap_err();
        assert!(matches!(err, AuditError::InvalidSnapshot { .. }));
    }

    #[test]
    fn test_data_cells_never_exceed_capacity() {
        let tab = snapshot(
            "full",
            2,
            2,
            2,
            2,
            vec![vec![text("a"), text("b")], vec![text("c"), text("d")]],
            vec![vec!["", ""], vec!["", ""]],
        );
        let outcome = extract("doc", &[tab], 2_000_000, 0.0).unwrap();
        assert!(outcome.tabs[0].data_cells <= outcome.tabs[0].cells);
        assert_eq!(outcome.tabs[0].data_cells, 4);
    }
}
