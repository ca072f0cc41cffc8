//! Schema projection: requested field names + catalog + metric records →
//! `{schema, rows}` for the reporting tool.
//!
//! Field dispatch is a lookup table from field name to accessor function,
//! built once when the projector is constructed, instead of an open-ended
//! per-field conditional. The request kind (metrics vs revision history) is
//! resolved once from the whole requested-field set as an explicit enum, not
//! inferred from name prefixes.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{FieldDescriptor, FieldGroup};
use crate::error::AuditError;
use crate::extractor::TabMetrics;
use crate::snapshot::RevisionRecord;

/// One cell of an output row. The reporting tool only consumes text and
/// numbers; dates travel as numeric-string codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Placeholder for a field with no defined mapping on a record.
    pub fn empty() -> Self {
        Value::Text(String::new())
    }
}

/// Which record kind a request resolves to. A single request must resolve to
/// exactly one: per-tab metric rows and per-revision rows have incompatible
/// cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Metrics,
    Revisions,
}

/// The records a projection runs over.
#[derive(Debug, Clone)]
pub enum RecordSet {
    Tabs(Vec<TabMetrics>),
    Revisions(Vec<RevisionRecord>),
}

/// Projection result: selected schema in request order plus one value row
/// per input record, values ordered to match the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedTable {
    pub schema: Vec<FieldDescriptor>,
    pub rows: Vec<Vec<Value>>,
}

type TabAccessor = fn(&TabMetrics) -> Value;
type RevisionAccessor = fn(&RevisionRecord) -> Value;

/// Projects metric records onto requested fields. Owns the immutable field
/// catalog and the accessor tables.
pub struct Projector {
    catalog: Vec<FieldDescriptor>,
    tab_accessors: HashMap<&'static str, TabAccessor>,
    revision_accessors: HashMap<&'static str, RevisionAccessor>,
}

impl Projector {
    pub fn new(catalog: Vec<FieldDescriptor>) -> Self {
        Self {
            catalog,
            tab_accessors: tab_accessors(),
            revision_accessors: revision_accessors(),
        }
    }

    pub fn catalog(&self) -> &[FieldDescriptor] {
        &self.catalog
    }

    /// Resolve the request kind from the full requested-field set.
    ///
    /// Unknown field names do not influence the outcome; a request with no
    /// known revision field is a metrics request. Mixing the two categories
    /// is a hard, user-facing error.
    pub fn resolve_request_kind(&self, fields: &[String]) -> Result<RequestKind, AuditError> {
        let mut revision_fields = Vec::new();
        let mut metric_fields = Vec::new();

        for name in fields {
            match self.lookup(name) {
                Some(desc) if desc.group == FieldGroup::Revision => {
                    revision_fields.push(name.clone());
                }
                Some(_) => metric_fields.push(name.clone()),
                None => {}
            }
        }

        match (revision_fields.is_empty(), metric_fields.is_empty()) {
            (false, false) => Err(AuditError::MixedCategoryRequest {
                revision_fields,
                metric_fields,
            }),
            (false, true) => Ok(RequestKind::Revisions),
            _ => Ok(RequestKind::Metrics),
        }
    }

    /// Project records onto the requested fields.
    ///
    /// The schema preserves the caller's field order; for duplicate catalog
    /// names the first catalog entry wins. Unknown field names contribute no
    /// schema entry (and therefore no row value); a known field with no
    /// accessor on this record kind yields an empty value instead of failing
    /// the row.
    pub fn project(
        &self,
        fields: &[String],
        records: &RecordSet,
    ) -> Result<ProjectedTable, AuditError> {
        // Re-resolving here keeps the mixed-category rejection local to the
        // projector even for callers that skipped resolve_request_kind.
        self.resolve_request_kind(fields)?;

        let schema = self.select_schema(fields);
        let rows = match records {
            RecordSet::Tabs(tabs) => project_rows(&schema, tabs, &self.tab_accessors),
            RecordSet::Revisions(revs) => project_rows(&schema, revs, &self.revision_accessors),
        };

        debug!(
            "projected {} fields over {} records ({} requested)",
            schema.len(),
            rows.len(),
            fields.len()
        );

        Ok(ProjectedTable { schema, rows })
    }

    /// Selected descriptors in request order. Unknown names are dropped.
    fn select_schema(&self, fields: &[String]) -> Vec<FieldDescriptor> {
        fields
            .iter()
            .filter_map(|name| self.lookup(name).cloned())
            .collect()
    }

    /// First catalog entry with a matching name (catalog order tie-break).
    fn lookup(&self, name: &str) -> Option<&FieldDescriptor> {
        self.catalog.iter().find(|f| f.name == name)
    }
}

fn project_rows<R>(
    schema: &[FieldDescriptor],
    records: &[R],
    accessors: &HashMap<&'static str, fn(&R) -> Value>,
) -> Vec<Vec<Value>> {
    records
        .iter()
        .map(|record| {
            schema
                .iter()
                .map(|field| match accessors.get(field.name.as_str()) {
                    Some(accessor) => accessor(record),
                    None => Value::empty(),
                })
                .collect()
        })
        .collect()
}

fn tab_accessors() -> HashMap<&'static str, TabAccessor> {
    let mut m: HashMap<&'static str, TabAccessor> = HashMap::new();
    m.insert("file_name", |t| Value::text(t.document.file_name.clone()));
    m.insert("sheet_name", |t| Value::text(t.name.clone()));
    m.insert("sheet_cells", |t| Value::number(t.cells as f64));
    m.insert("sheet_rows", |t| Value::number(f64::from(t.rows)));
    m.insert("sheet_cols", |t| Value::number(f64::from(t.cols)));
    m.insert("sheet_data_cells", |t| Value::number(t.data_cells as f64));
    m.insert("now_func_counter", |t| Value::number(t.now_funcs as f64));
    m.insert("today_func_counter", |t| Value::number(t.today_funcs as f64));
    m.insert("rand_func_counter", |t| Value::number(t.rand_funcs as f64));
    m.insert("randbetween_func_counter", |t| {
        Value::number(t.randbetween_funcs as f64)
    });
    m.insert("array_func_counter", |t| Value::number(t.array_funcs as f64));
    m.insert("vlookup_func_counter", |t| {
        Value::number(t.vlookup_funcs as f64)
    });
    m.insert("chart_counter", |t| Value::number(f64::from(t.charts)));
    m.insert("total_cells", |t| {
        Value::number(t.document.total_cells as f64)
    });
    m.insert("total_data_cells", |t| {
        Value::number(t.document.total_data_cells as f64)
    });
    m.insert("number_sheets", |t| {
        Value::number(f64::from(t.document.tab_count))
    });
    m.insert("total_cell_percentage", |t| {
        Value::number(t.document.total_cell_ratio)
    });
    m.insert("total_cell_percentage_100", |t| {
        Value::number(t.document.total_cell_ratio * 100.0)
    });
    m.insert("total_data_cell_percentage", |t| {
        Value::number(t.document.total_data_cell_ratio)
    });
    m.insert("sheet_load_time", |t| {
        Value::number(t.document.load_time_secs)
    });
    m
}

fn revision_accessors() -> HashMap<&'static str, RevisionAccessor> {
    let mut m: HashMap<&'static str, RevisionAccessor> = HashMap::new();
    m.insert("revision_user_name", |r| Value::text(r.user_name.clone()));
    m.insert("revision_email", |r| Value::text(r.email.clone()));
    m.insert("revision_date", |r| Value::text(r.date.clone()));
    m.insert("revision_date_hour", |r| Value::text(r.date_hour.clone()));
    m.insert("revision_id", |r| Value::text(r.id.clone()));
    m.insert("revision_arbNum", |r| Value::number(r.arb_num as f64));
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use crate::extractor::{DocumentMetrics, TabMetrics};
    use crate::snapshot::RevisionRecord;

    fn sample_tabs() -> Vec<TabMetrics> {
        let document = DocumentMetrics {
            file_name: "Budget".to_string(),
            tab_count: 2,
            total_cells: 1_500,
            total_data_cells: 40,
            total_cell_ratio: 0.00075,
            total_data_cell_ratio: 0.00002,
            load_time_secs: 1.25,
        };
        vec![
            TabMetrics {
                name: "Summary".to_string(),
                cells: 1_000,
                rows: 100,
                cols: 10,
                data_cells: 30,
                now_funcs: 1,
                today_funcs: 0,
                rand_funcs: 2,
                randbetween_funcs: 1,
                array_funcs: 0,
                vlookup_funcs: 3,
                charts: 2,
                document: document.clone(),
            },
            TabMetrics {
                name: "Raw".to_string(),
                cells: 500,
                rows: 50,
                cols: 10,
                data_cells: 10,
                now_funcs: 0,
                today_funcs: 1,
                rand_funcs: 0,
                randbetween_funcs: 0,
                array_funcs: 1,
                vlookup_funcs: 0,
                charts: 0,
                document,
            },
        ]
    }

    fn sample_revisions() -> Vec<RevisionRecord> {
        vec![RevisionRecord::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "2017-10-05T15:59:15.905Z",
            "42".to_string(),
        )
        .unwrap()]
    }

    fn projector() -> Projector {
        Projector::new(build_catalog(2_000_000))
    }

    #[test]
    fn test_schema_follows_request_order() {
        let p = projector();
        let fields = vec![
            "sheet_cells".to_string(),
            "sheet_name".to_string(),
            "total_cell_percentage".to_string(),
        ];
        let table = p
            .project(&fields, &RecordSet::Tabs(sample_tabs()))
            .unwrap();
        let names: Vec<&str> = table.schema.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["sheet_cells", "sheet_name", "total_cell_percentage"]);
        assert_eq!(
            table.rows[0],
            vec![
                Value::number(1_000.0),
                Value::text("Summary"),
                Value::number(0.00075)
            ]
        );
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_unknown_field_degrades_to_empty() {
        let p = projector();
        let fields = vec!["nonexistent_field".to_string()];
        let table = p
            .project(&fields, &RecordSet::Tabs(sample_tabs()))
            .unwrap();
        assert!(table.schema.is_empty());
        assert_eq!(table.rows, vec![Vec::<Value>::new(), Vec::new()]);
    }

    #[test]
    fn test_unknown_field_mixed_with_known_field() {
        let p = projector();
        let fields = vec!["nonexistent_field".to_string(), "sheet_name".to_string()];
        let table = p
            .project(&fields, &RecordSet::Tabs(sample_tabs()))
            .unwrap();
        assert_eq!(table.schema.len(), 1);
        assert_eq!(table.rows[0], vec![Value::text("Summary")]);
    }

    #[test]
    fn test_mixed_category_request_rejected() {
        let p = projector();
        let fields = vec!["revision_id".to_string(), "sheet_name".to_string()];
        let err = p
            .project(&fields, &RecordSet::Tabs(sample_tabs()))
            .unwrap_err();
        assert!(matches!(err, AuditError::MixedCategoryRequest { .. }));
    }

    #[test]
    fn test_request_kind_resolution() {
        let p = projector();
        assert_eq!(
            p.resolve_request_kind(&["sheet_name".to_string()]).unwrap(),
            RequestKind::Metrics
        );
        assert_eq!(
            p.resolve_request_kind(&["revision_id".to_string(), "revision_date".to_string()])
                .unwrap(),
            RequestKind::Revisions
        );
        // Unknown-only requests default to metrics.
        assert_eq!(
            p.resolve_request_kind(&["bogus".to_string()]).unwrap(),
            RequestKind::Metrics
        );
    }

    #[test]
    fn test_revision_projection() {
        let p = projector();
        let fields = vec![
            "revision_date".to_string(),
            "revision_date_hour".to_string(),
            "revision_arbNum".to_string(),
        ];
        let table = p
            .project(&fields, &RecordSet::Revisions(sample_revisions()))
            .unwrap();
        assert_eq!(
            table.rows,
            vec![vec![
                Value::text("20171005"),
                Value::text("2017100515"),
                Value::number(1.0)
            ]]
        );
    }

    #[test]
    fn test_projection_is_idempotent() {
        let p = projector();
        let fields = vec!["sheet_name".to_string(), "sheet_data_cells".to_string()];
        let records = RecordSet::Tabs(sample_tabs());
        let first = p.project(&fields, &records).unwrap();
        let second = p.project(&fields, &records).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_first_catalog_match_wins_on_duplicates() {
        let mut catalog = build_catalog(2_000_000);
        let mut dup = catalog[1].clone(); // sheet_name
        dup.label = "Shadowed duplicate".to_string();
        catalog.push(dup);
        let p = Projector::new(catalog);

        let table = p
            .project(
                &["sheet_name".to_string()],
                &RecordSet::Tabs(sample_tabs()),
            )
            .unwrap();
        assert_eq!(table.schema[0].label, "Sheet name");
    }

    #[test]
    fn test_field_without_accessor_yields_empty_value() {
        // A catalog entry the dispatch table does not know about must not
        // abort the row.
        let mut catalog = build_catalog(2_000_000);
        let mut extra = catalog[2].clone(); // sheet_cells, group sheet
        extra.name = "sheet_future_metric".to_string();
        catalog.push(extra);
        let p = Projector::new(catalog);

        let table = p
            .project(
                &["sheet_future_metric".to_string(), "sheet_name".to_string()],
                &RecordSet::Tabs(sample_tabs()),
            )
            .unwrap();
        assert_eq!(
            table.rows[0],
            vec![Value::empty(), Value::text("Summary")]
        );
    }
}
