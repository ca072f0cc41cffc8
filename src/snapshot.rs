//! Input records for the audit core.
//!
//! Snapshots are captured once per audit by a collaborator (the hosted
//! Sheets API client or the local workbook parser), handed to the extractor,
//! and discarded. The extractor performs no I/O of its own.

use serde::Serialize;

use crate::dates::{date_code, date_hour_code};
use crate::error::AuditError;

/// One cell of the used range, as captured at fetch time.
///
/// The distinction between `Text(String::new())` and other values matters:
/// only the literal empty string counts as "no data" when deriving the
/// data-cell count. A numeric 0 or `false` is data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    /// True only for the empty-string value.
    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }
}

/// One tab of a spreadsheet at fetch time. Immutable once captured.
///
/// `values` and `formulas` are rectangular grids covering exactly the used
/// range (`last_row` x `last_col`); `formulas` holds an empty string where a
/// cell has no formula. The extractor validates this shape and reports a
/// mismatch as [`AuditError::InvalidSnapshot`].
#[derive(Debug, Clone)]
pub struct TabSnapshot {
    pub name: String,
    /// Declared grid height (`getMaxRows` equivalent).
    pub rows: u32,
    /// Declared grid width (`getMaxColumns` equivalent).
    pub cols: u32,
    /// Last row that has ever held content (1-based count).
    pub last_row: u32,
    /// Last column that has ever held content (1-based count).
    pub last_col: u32,
    pub values: Vec<Vec<Cell>>,
    pub formulas: Vec<Vec<String>>,
    /// Supplied by the collaborator; the extractor does not compute it.
    pub charts: u32,
}

impl TabSnapshot {
    /// Used-range area. Zero means the tab has never held content.
    pub fn used_area(&self) -> u64 {
        u64::from(self.last_row) * u64::from(self.last_col)
    }
}

/// One historical save event of the audited document.
///
/// Both date codes are derived from the same source timestamp at
/// construction so every consumer sees consistent truncations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionRecord {
    pub user_name: String,
    pub email: String,
    /// `YYYYMMDD` code of the revision timestamp.
    pub date: String,
    /// `YYYYMMDDHH` code of the revision timestamp.
    pub date_hour: String,
    pub id: String,
    /// Constant 1, for count aggregation in the reporting tool.
    pub arb_num: u64,
}

impl RevisionRecord {
    pub fn new(
        user_name: String,
        email: String,
        modified_at: &str,
        id: String,
    ) -> Result<Self, AuditError> {
        Ok(Self {
            user_name,
            email,
            date: date_code(modified_at)?,
            date_hour: date_hour_code(modified_at)?,
            id,
            arb_num: 1,
        })
    }
}
