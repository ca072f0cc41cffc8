//! Connector error taxonomy.
//!
//! Each variant is a distinct, user-actionable failure category. Unknown
//! requested fields are deliberately *not* an error; the projector degrades
//! them to an empty schema entry (see `projector.rs`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The user-entered url does not point at a spreadsheet document.
    #[error("'{url}' is not a Google Sheets url. Expected something like https://docs.google.com/spreadsheets/d/<id>/")]
    BadUrl { url: String },

    /// A tab snapshot's grids do not match its declared used range.
    /// Precondition violation in the collaborator that built the snapshot.
    #[error("snapshot for tab '{tab}' is malformed: {reason}")]
    InvalidSnapshot { tab: String, reason: String },

    /// Revision-history fields and spreadsheet-metric fields were requested
    /// in the same table. The two produce different row counts (one row per
    /// revision vs one row per tab) so they can never share a table.
    #[error(
        "revision history fields and spreadsheet metric fields cannot be combined in one request; \
         ask for them as two separate tables (revision fields: {revision_fields:?}, metric fields: {metric_fields:?})"
    )]
    MixedCategoryRequest {
        revision_fields: Vec<String>,
        metric_fields: Vec<String>,
    },

    /// The hosted spreadsheet/revision service could not be reached or
    /// refused the request (permissions, quota, bad id).
    #[error("cannot retrieve data from the spreadsheet service: {0}")]
    Fetch(String),

    /// Data was obtained (from the service or an uploaded file) but could
    /// not be interpreted.
    #[error("cannot parse spreadsheet data: {0}")]
    Decode(String),

    /// An uploaded file has an extension the workbook parser does not handle.
    #[error("unsupported file type '.{ext}'. Supported: .csv, .xlsx, .xlsm, .xlsb")]
    UnsupportedFile { ext: String },
}
