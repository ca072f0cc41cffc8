//! Static field catalog for the audit connector.
//!
//! Field names are wire-stable identifiers: saved reports reference them, so
//! renaming one (yes, even `revision_arbNum`) requires a migration story.
//! The catalog is an explicitly constructed, immutable value owned by the
//! projector, not ambient global state.

use serde::Serialize;

/// Declared value type of a reportable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Text,
    Number,
    Percent,
    Duration,
    YearMonthDay,
    YearMonthDayHour,
}

/// Whether a field identifies rows or measures them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Concept {
    Dimension,
    Metric,
}

/// Category a field belongs to. `Revision` fields produce one row per
/// historical revision; everything else produces one row per tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Sheet,
    SheetFormulas,
    Totals,
    Revision,
}

/// Catalog entry describing one reportable column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub description: String,
    pub value_type: ValueType,
    pub concept: Concept,
    pub group: FieldGroup,
    /// True when the metric can be summed across groupings without
    /// double-counting. Document-level totals and ratios are already
    /// whole-document values, so re-summing them per tab would inflate them.
    pub reaggregatable: bool,
}

impl FieldDescriptor {
    fn dimension(
        name: &str,
        label: &str,
        description: &str,
        value_type: ValueType,
        group: FieldGroup,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            value_type,
            concept: Concept::Dimension,
            group,
            reaggregatable: false,
        }
    }

    fn metric(
        name: &str,
        label: &str,
        description: &str,
        value_type: ValueType,
        group: FieldGroup,
        reaggregatable: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            value_type,
            concept: Concept::Metric,
            group,
            reaggregatable,
        }
    }
}

/// Build the full field catalog. `capacity_ceiling` is interpolated into the
/// ratio field descriptions so the reporting UI shows the actual limit.
pub fn build_catalog(capacity_ceiling: u64) -> Vec<FieldDescriptor> {
    use FieldGroup::*;
    use ValueType::*;

    vec![
        FieldDescriptor::dimension(
            "file_name",
            "Google Sheet filename",
            "Name of your Google Sheet",
            Text,
            Totals,
        ),
        FieldDescriptor::dimension(
            "sheet_name",
            "Sheet name",
            "Name of the individual tabs in your Google Sheet",
            Text,
            Sheet,
        ),
        FieldDescriptor::metric(
            "sheet_cells",
            "Sheet cell count",
            "Count of the number of cells in a single tab of your Google Sheet",
            Number,
            Sheet,
            true,
        ),
        FieldDescriptor::metric(
            "sheet_rows",
            "Sheet row count",
            "Count of the number of rows in a single tab of your Google Sheet",
            Number,
            Sheet,
            true,
        ),
        FieldDescriptor::metric(
            "sheet_cols",
            "Sheet column count",
            "Count of the number of columns in a single tab of your Google Sheet",
            Number,
            Sheet,
            true,
        ),
        FieldDescriptor::metric(
            "sheet_data_cells",
            "Sheet data cell count",
            "Count of the number of cells containing data, in a single tab of your Google Sheet",
            Number,
            Sheet,
            true,
        ),
        FieldDescriptor::metric(
            "now_func_counter",
            "NOW Function count",
            "Count of the number NOW() functions in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "today_func_counter",
            "TODAY Function count",
            "Count of the number TODAY() functions in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "rand_func_counter",
            "RAND Function count",
            "Count of the number RAND() functions in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "randbetween_func_counter",
            "RANDBETWEEN Function count",
            "Count of the number RANDBETWEEN() functions in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "array_func_counter",
            "Array Function count",
            "Count of the number ArrayFormula() functions in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "vlookup_func_counter",
            "Vlookup Function count",
            "Count of the number VLOOKUP() functions in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "chart_counter",
            "Chart count",
            "Count of the number of charts in a single tab of your Google Sheet",
            Number,
            SheetFormulas,
            true,
        ),
        FieldDescriptor::metric(
            "total_cells",
            "Total Cells",
            "Count of the total number of cells in your whole Google Sheet",
            Number,
            Totals,
            false,
        ),
        FieldDescriptor::metric(
            "total_data_cells",
            "Total Data Cells",
            "Count of the total number of cells containing data in your whole Google Sheet",
            Number,
            Totals,
            false,
        ),
        FieldDescriptor::metric(
            "number_sheets",
            "Number of Sheets",
            "Count of the number of sheets in your whole Google Sheet",
            Number,
            Totals,
            false,
        ),
        FieldDescriptor::metric(
            "total_cell_percentage",
            "Total Cells as Percent of Cell Limit",
            &format!(
                "Total Cells expressed as a fraction (0-1) of the Google Sheets Cell Limit of {}",
                capacity_ceiling
            ),
            Percent,
            Totals,
            false,
        ),
        FieldDescriptor::metric(
            "total_cell_percentage_100",
            "Total Cells / Cell Limit * 100",
            &format!("Total Cells / Cell Limit of {} * 100", capacity_ceiling),
            Percent,
            Totals,
            false,
        ),
        FieldDescriptor::metric(
            "total_data_cell_percentage",
            "Data Cells as Percent of Cell Limit",
            &format!(
                "Total Data Cells expressed as a fraction (0-1) of the Google Sheets Cell Limit of {}",
                capacity_ceiling
            ),
            Percent,
            Totals,
            false,
        ),
        FieldDescriptor::metric(
            "sheet_load_time",
            "Sheet Load Time",
            "Time taken to fetch data for this Google Sheet, in seconds",
            Duration,
            Totals,
            false,
        ),
        FieldDescriptor::dimension(
            "revision_user_name",
            "Revision User Name",
            "Name of the user who made this revision",
            Text,
            Revision,
        ),
        FieldDescriptor::dimension(
            "revision_email",
            "Revision Email",
            "Email of the user who made this revision",
            Text,
            Revision,
        ),
        FieldDescriptor::dimension(
            "revision_date",
            "Revision Date",
            "The date of a specific revision (in format YYYYMMDD eg 20170314)",
            YearMonthDay,
            Revision,
        ),
        FieldDescriptor::dimension(
            "revision_date_hour",
            "Revision Date Hour",
            "The date and hour of a specific revision (in format YYYYMMDDHH eg 2017031415)",
            YearMonthDayHour,
            Revision,
        ),
        FieldDescriptor::dimension(
            "revision_id",
            "Revision ID",
            "ID of this revision",
            Text,
            Revision,
        ),
        FieldDescriptor::metric(
            "revision_arbNum",
            "Revision Count",
            "Fixed number 1 for this revision for aggregations",
            Number,
            Revision,
            true,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_unique() {
        let catalog = build_catalog(2_000_000);
        let mut names: Vec<&str> = catalog.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), catalog.len());
    }

    #[test]
    fn test_catalog_covers_all_groups() {
        let catalog = build_catalog(2_000_000);
        assert_eq!(catalog.len(), 26);
        for group in [
            FieldGroup::Sheet,
            FieldGroup::SheetFormulas,
            FieldGroup::Totals,
            FieldGroup::Revision,
        ] {
            assert!(catalog.iter().any(|f| f.group == group));
        }
    }

    #[test]
    fn test_ceiling_interpolated_into_descriptions() {
        let catalog = build_catalog(2_000_000);
        let ratio = catalog
            .iter()
            .find(|f| f.name == "total_cell_percentage")
            .unwrap();
        assert!(ratio.description.contains("2000000"));
    }

    #[test]
    fn test_document_totals_not_reaggregatable() {
        let catalog = build_catalog(2_000_000);
        for name in [
            "total_cells",
            "total_data_cells",
            "number_sheets",
            "total_cell_percentage",
            "total_data_cell_percentage",
            "sheet_load_time",
        ] {
            let field = catalog.iter().find(|f| f.name == name).unwrap();
            assert!(!field.reaggregatable, "{} must not be reaggregatable", name);
        }
        let per_tab = catalog.iter().find(|f| f.name == "sheet_cells").unwrap();
        assert!(per_tab.reaggregatable);
    }
}
