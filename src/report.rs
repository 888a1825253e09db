//! Validation findings and the report value returned by the engine.
//!
//! Findings are data, not `Err`s: every per-cell, per-row, and cross-table
//! problem becomes an [`Issue`] collected into [`WarningsAndErrors`]. Only
//! unrecoverable conditions (unreadable metadata, unresolvable schema) travel
//! through `anyhow::Result`.

use serde::Serialize;

pub const CATEGORY_SCHEMA_HEADER: &str = "Schema";
pub const CATEGORY_SCHEMA: &str = "schema";
pub const CATEGORY_STRUCTURE: &str = "structure";
pub const CATEGORY_METADATA: &str = "metadata";

/// A single warning or error with row/column context.
///
/// `row` and `column` are 1-based and rendered as strings so that "not
/// applicable" can be the empty string, matching the report wire shape.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub row: String,
    pub column: String,
    pub content: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extra: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
}

impl Issue {
    pub fn new(kind: impl Into<String>, category: &str, content: impl Into<String>) -> Self {
        Issue {
            kind: kind.into(),
            category: category.to_string(),
            row: String::new(),
            column: String::new(),
            content: content.into(),
            extra: String::new(),
            csv_path: None,
        }
    }

    /// A cell-level schema error carrying the `required` flag of its column.
    pub fn cell(
        kind: impl Into<String>,
        row: u64,
        column: usize,
        content: impl Into<String>,
        required: bool,
    ) -> Self {
        let mut issue = Issue::new(kind, CATEGORY_SCHEMA, content);
        issue.row = row.to_string();
        issue.column = column.to_string();
        issue.extra = format!("required => {required}");
        issue
    }

    pub fn structure(kind: impl Into<String>, row: u64, content: impl Into<String>) -> Self {
        let mut issue = Issue::new(kind, CATEGORY_STRUCTURE, content);
        issue.row = row.to_string();
        issue
    }

    /// A header-level finding; these use the capitalised `Schema` category.
    pub fn header(kind: impl Into<String>, column: usize, content: impl Into<String>) -> Self {
        let mut issue = Issue::new(kind, CATEGORY_SCHEMA_HEADER, content);
        issue.row = "1".to_string();
        issue.column = column.to_string();
        issue
    }

    pub fn metadata(content: impl Into<String>) -> Self {
        Issue::new("metadata", CATEGORY_METADATA, content)
    }

    pub fn with_row(mut self, row: u64) -> Self {
        self.row = row.to_string();
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column.to_string();
        self
    }

    pub fn with_csv_path(mut self, path: impl Into<String>) -> Self {
        self.csv_path = Some(path.into());
        self
    }

    fn row_sort_key(&self) -> u64 {
        self.row.parse().unwrap_or(0)
    }
}

/// The structured outcome of a validation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarningsAndErrors {
    pub warnings: Vec<Issue>,
    pub errors: Vec<Issue>,
}

impl WarningsAndErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, issue: Issue) {
        self.warnings.push(issue);
    }

    pub fn error(&mut self, issue: Issue) {
        self.errors.push(issue);
    }

    pub fn absorb(&mut self, other: WarningsAndErrors) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Orders findings by row number for stable output; findings without a
    /// row sort first, preserving their relative emission order.
    pub fn sort_by_row(&mut self) {
        self.warnings.sort_by_key(Issue::row_sort_key);
        self.errors.sort_by_key(Issue::row_sort_key);
    }
}
