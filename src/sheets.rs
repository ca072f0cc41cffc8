//! Google Sheets / Drive API client.
//!
//! Produces the already-materialized inputs the audit core consumes:
//! [`TabSnapshot`]s from the Sheets v4 grid-data endpoint and
//! [`RevisionRecord`]s from the Drive v3 revisions endpoint. All network and
//! permission failures surface here, as `Fetch`/`Decode`; the extractor and
//! projector never see them.

use std::env;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AuditError;
use crate::snapshot::{Cell, RevisionRecord, TabSnapshot};

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Grid data, dimensions and chart counts in one round trip.
const SPREADSHEET_FIELDS: &str = "properties.title,sheets(properties(title,gridProperties(rowCount,columnCount)),charts(chartId),data(rowData(values(formattedValue,effectiveValue,userEnteredValue))))";

const REVISION_FIELDS: &str =
    "revisions(id,modifiedTime,lastModifyingUser(displayName,emailAddress))";

/// Client for the hosted spreadsheet and file-revision services.
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    token: String,
}

impl SheetsClient {
    /// Create a client, reading the OAuth bearer token from the
    /// GOOGLE_API_TOKEN env var.
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;
        let token =
            env::var("GOOGLE_API_TOKEN").context("GOOGLE_API_TOKEN environment variable not set")?;
        Ok(Self {
            client: Client::new(),
            token,
        })
    }

    /// Fetch the document title and one snapshot per tab for the spreadsheet
    /// behind a user-entered url.
    pub async fn fetch_spreadsheet(
        &self,
        url: &str,
    ) -> Result<(String, Vec<TabSnapshot>), AuditError> {
        let id = spreadsheet_id(url)?;
        debug!("fetching spreadsheet {}", id);

        let request_url = format!("{}/{}", SHEETS_API_URL, id);
        let response: SpreadsheetResponse = self
            .get_json(&request_url, &[("includeGridData", "true"), ("fields", SPREADSHEET_FIELDS)])
            .await?;

        let (name, tabs) = snapshots_from_response(response);
        info!("fetched '{}': {} tabs", name, tabs.len());
        Ok((name, tabs))
    }

    /// List the historical revisions of the document behind a user-entered url.
    pub async fn fetch_revisions(&self, url: &str) -> Result<Vec<RevisionRecord>, AuditError> {
        let id = spreadsheet_id(url)?;
        debug!("fetching revisions for {}", id);

        let request_url = format!("{}/{}/revisions", DRIVE_API_URL, id);
        let response: RevisionListResponse = self
            .get_json(&request_url, &[("pageSize", "1000"), ("fields", REVISION_FIELDS)])
            .await?;

        let revisions = revisions_from_response(response)?;
        info!("fetched {} revisions for {}", revisions.len(), id);
        Ok(revisions)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AuditError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| AuditError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuditError::Fetch(format!("{}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| AuditError::Decode(e.to_string()))
    }
}

/// Extract the document id from a user-entered Sheets url.
fn spreadsheet_id(url: &str) -> Result<String, AuditError> {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| {
        Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").expect("spreadsheet id pattern")
    });

    re.captures(url)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AuditError::BadUrl {
            url: url.to_string(),
        })
}

/// Build tab snapshots out of a grid-data response.
///
/// The API omits trailing empty rows and trailing empty cells per row, so
/// the used range is the extent of what it sent back; grids are padded out
/// to that extent so the extractor sees rectangular input.
fn snapshots_from_response(response: SpreadsheetResponse) -> (String, Vec<TabSnapshot>) {
    let tabs = response
        .sheets
        .into_iter()
        .map(|sheet| {
            let grid = sheet.properties.grid_properties;
            let row_data = sheet
                .data
                .into_iter()
                .next()
                .map(|d| d.row_data)
                .unwrap_or_default();

            let last_row = row_data.len() as u32;
            let last_col = row_data.iter().map(|r| r.values.len()).max().unwrap_or(0) as u32;

            let mut values = Vec::with_capacity(row_data.len());
            let mut formulas = Vec::with_capacity(row_data.len());
            for row in &row_data {
                let mut value_row = Vec::with_capacity(last_col as usize);
                let mut formula_row = Vec::with_capacity(last_col as usize);
                for i in 0..last_col as usize {
                    match row.values.get(i) {
                        Some(cell) => {
                            value_row.push(cell.to_cell());
                            formula_row.push(cell.formula().unwrap_or_default());
                        }
                        None => {
                            value_row.push(Cell::empty());
                            formula_row.push(String::new());
                        }
                    }
                }
                values.push(value_row);
                formulas.push(formula_row);
            }

            TabSnapshot {
                name: sheet.properties.title,
                rows: grid.row_count,
                cols: grid.column_count,
                last_row,
                last_col,
                values,
                formulas,
                charts: sheet.charts.len() as u32,
            }
        })
        .collect();

    (response.properties.title, tabs)
}

/// Map the Drive revision listing onto audit records. An unparseable
/// revision timestamp fails the whole listing rather than silently
/// misdating part of the history.
fn revisions_from_response(
    response: RevisionListResponse,
) -> Result<Vec<RevisionRecord>, AuditError> {
    response
        .revisions
        .into_iter()
        .map(|rev| {
            let user = rev.last_modifying_user.unwrap_or_default();
            RevisionRecord::new(
                user.display_name.unwrap_or_default(),
                user.email_address.unwrap_or_default(),
                &rev.modified_time,
                rev.id,
            )
        })
        .collect()
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    properties: DocumentProperties,
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct DocumentProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
    #[serde(default)]
    charts: Vec<serde_json::Value>,
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    formatted_value: Option<String>,
    effective_value: Option<ExtendedValue>,
    user_entered_value: Option<ExtendedValue>,
}

impl CellData {
    /// Evaluated cell value; never-populated cells come through as the
    /// empty string, matching the deduction rule.
    fn to_cell(&self) -> Cell {
        if let Some(ev) = &self.effective_value {
            if let Some(n) = ev.number_value {
                return Cell::Number(n);
            }
            if let Some(b) = ev.bool_value {
                return Cell::Bool(b);
            }
            if let Some(s) = &ev.string_value {
                return Cell::Text(s.clone());
            }
        }
        match &self.formatted_value {
            Some(s) => Cell::Text(s.clone()),
            None => Cell::empty(),
        }
    }

    fn formula(&self) -> Option<String> {
        self.user_entered_value
            .as_ref()
            .and_then(|v| v.formula_value.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtendedValue {
    number_value: Option<f64>,
    string_value: Option<String>,
    bool_value: Option<bool>,
    formula_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RevisionListResponse {
    #[serde(default)]
    revisions: Vec<DriveRevision>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveRevision {
    id: String,
    modified_time: String,
    last_modifying_user: Option<DriveUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveUser {
    display_name: Option<String>,
    email_address: Option<String>,
}
