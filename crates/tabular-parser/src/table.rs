//! In-memory tabular data with unique column naming.

/// Parsed tabular data: named columns and string-valued rows.
///
/// Rows may be shorter than the column set (trailing cells absent) but
/// never wider: [`DataTable::push_row`] grows the column set first.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Create a column name not used by any existing column.
    ///
    /// An empty base falls back to `Column`; a taken base gets a numeric
    /// suffix (`Column1`, `Column2`, ...) scanning upward until unused.
    pub fn unique_column_name(&self, base: &str) -> String {
        let base = if base.is_empty() { "Column" } else { base };

        if !self.contains_column(base) {
            return base.to_string();
        }

        let mut counter = 1;
        loop {
            let candidate = format!("{}{}", base, counter);
            if !self.contains_column(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Add a header column, rewriting blank or duplicate names to a
    /// generated unique name.
    pub fn add_header_column(&mut self, header: &str) {
        let name = if header.is_empty() || self.contains_column(header) {
            self.unique_column_name(header)
        } else {
            header.to_string()
        };
        self.columns.push(name);
    }

    /// Append a row, growing the column set with generated names if the
    /// row is wider than the current columns. Rows are never rejected
    /// for width.
    pub fn push_row(&mut self, row: Vec<String>) {
        while row.len() > self.columns.len() {
            let name = self.unique_column_name("");
            self.columns.push(name);
        }
        self.rows.push(row);
    }

    /// Cell value at (row, column); `None` when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}
