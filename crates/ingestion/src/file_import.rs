//! Mapping parsed tabular data onto observation series.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::warn;

use hydro_common::{DataValue, OverwritePolicy, Series, Site, Theme, Variable};
use tabular_parser::DataTable;

/// Binds one table column to the series it populates.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// Column name as it appears in the parsed table.
    pub column: String,
    pub site: Site,
    pub variable: Variable,
    /// Columns with `import` unset are carried in the mapping UI but
    /// produce no series.
    pub import: bool,
}

impl ColumnMapping {
    pub fn new(column: impl Into<String>, site: Site, variable: Variable) -> Self {
        Self {
            column: column.into(),
            site,
            variable,
            import: true,
        }
    }
}

/// Everything a file import job needs besides the repository.
#[derive(Debug, Clone)]
pub struct FileImportSettings {
    pub path: PathBuf,
    pub has_header: bool,
    /// Column holding the observation timestamps.
    pub datetime_column: String,
    pub mappings: Vec<ColumnMapping>,
    /// Per-pair policies, keyed by (site code, variable code). Consulted
    /// only for pairs that already have a stored series.
    pub policies: HashMap<(String, String), OverwritePolicy>,
    /// Fallback when an existing pair has no entry in `policies`.
    pub default_policy: OverwritePolicy,
    /// Grouping theme; derived from the file name when not set.
    pub theme: Option<Theme>,
}

impl FileImportSettings {
    pub fn new(path: impl Into<PathBuf>, datetime_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            has_header: true,
            datetime_column: datetime_column.into(),
            mappings: Vec::new(),
            policies: HashMap::new(),
            default_policy: OverwritePolicy::Overwrite,
            theme: None,
        }
    }

    /// The theme series from this import attach to. Defaults to the file
    /// stem, so `march.csv` imports under a theme named `march`.
    pub fn resolve_theme(&self) -> Theme {
        match &self.theme {
            Some(theme) => theme.clone(),
            None => Theme::new(file_stem(&self.path)),
        }
    }

    /// Policy for a pair that already has a stored series. New pairs never
    /// consult this; they are written outright.
    pub fn policy_for(&self, site_code: &str, variable_code: &str) -> OverwritePolicy {
        self.policies
            .get(&(site_code.to_string(), variable_code.to_string()))
            .copied()
            .unwrap_or(self.default_policy)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "import".to_string())
}

/// Timestamp formats accepted in import files.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only formats; parsed values land at midnight.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

fn parse_cell_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = chrono::NaiveDate::parse_from_str(s, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Build one series per imported column.
///
/// Rows whose timestamp cell fails to parse are skipped for every column;
/// cells that fail to parse as a number are skipped for that column only.
/// Skips are logged, never fatal. Mappings whose column is absent from the
/// table yield an empty series, which the repository treats as a no-op.
pub fn build_series(table: &DataTable, settings: &FileImportSettings) -> Vec<Series> {
    let datetime_index = table.column_index(&settings.datetime_column);
    if datetime_index.is_none() {
        warn!(
            column = %settings.datetime_column,
            "Datetime column not found; no rows can be imported"
        );
    }

    let mut out = Vec::new();
    for mapping in settings.mappings.iter().filter(|m| m.import) {
        let mut series = Series::new(mapping.site.clone(), mapping.variable.clone());

        if let (Some(dt_col), Some(value_col)) =
            (datetime_index, table.column_index(&mapping.column))
        {
            for row in 0..table.row_count() {
                let Some(raw_ts) = table.cell(row, dt_col) else {
                    continue;
                };
                let Some(timestamp) = parse_cell_timestamp(raw_ts) else {
                    warn!(row, value = %raw_ts, "Skipping row with unparseable timestamp");
                    continue;
                };

                let Some(raw_value) = table.cell(row, value_col) else {
                    continue;
                };
                match raw_value.trim().parse::<f64>() {
                    Ok(value) => series.push_value(DataValue::new(value, timestamp)),
                    Err(_) => {
                        warn!(row, column = %mapping.column, value = %raw_value,
                            "Skipping unparseable data value");
                    }
                }
            }
        } else if datetime_index.is_some() {
            warn!(column = %mapping.column, "Mapped column not found in table");
        }

        out.push(series);
    }
    out
}
