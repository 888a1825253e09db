//! In-memory schema model: table group, tables, columns, dialects, and
//! foreign-key declarations, as produced by [`crate::metadata`] intake.

use std::hash::{Hash, Hasher};

use crate::datatype::{Datatype, Format};

/// An ordered collection of tables validated together. Grouping carries no
/// semantics beyond shared intake and cross-table integrity checking.
#[derive(Debug, Clone, Default)]
pub struct TableGroup {
    pub tables: Vec<Table>,
}

impl TableGroup {
    pub fn table_by_url(&self, url: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.url == url)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub url: String,
    pub id: Option<String>,
    pub suppress_output: bool,
    pub notes: Option<serde_json::Value>,
    pub schema: TableSchema,
    pub dialect: Dialect,
    /// Foreign keys defined in *other* tables that point into this one,
    /// resolved after every table has been loaded.
    pub referenced_foreign_keys: Vec<ReferencedForeignKey>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    /// Indices into `columns`, in declaration order; empty when no key.
    pub primary_key: Vec<usize>,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
}

impl TableSchema {
    /// Number of columns expected in the CSV file (virtual columns have no
    /// physical cell).
    pub fn csv_column_count(&self) -> usize {
        self.columns.iter().filter(|c| !c.virtual_column).count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    /// 1-based position within the table schema.
    pub ordinal: usize,
    pub name: Option<String>,
    pub id: Option<String>,
    pub datatype: Datatype,
    pub format: Option<Format>,
    /// Never empty; defaults to a single empty string.
    pub null_tokens: Vec<String>,
    pub separator: Option<String>,
    pub required: bool,
    pub default: String,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Range bounds kept as raw text; parsed under the column's datatype on
    /// first use.
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    /// Language tag to ordered title strings, in declaration order.
    pub titles: Vec<(String, Vec<String>)>,
    pub lang: String,
    pub about_url: Option<String>,
    pub property_url: Option<String>,
    pub value_url: Option<String>,
    pub text_direction: Option<String>,
    pub ordered: bool,
    pub virtual_column: bool,
    pub suppress_output: bool,
}

impl Column {
    pub fn new(ordinal: usize) -> Self {
        Column {
            ordinal,
            name: None,
            id: None,
            datatype: Datatype::String,
            format: None,
            null_tokens: vec![String::new()],
            separator: None,
            required: false,
            default: String::new(),
            length: None,
            min_length: None,
            max_length: None,
            min_inclusive: None,
            max_inclusive: None,
            min_exclusive: None,
            max_exclusive: None,
            titles: Vec::new(),
            lang: "und".to_string(),
            about_url: None,
            property_url: None,
            value_url: None,
            text_direction: None,
            ordered: false,
            virtual_column: false,
            suppress_output: false,
        }
    }

    /// A separator turns the column into a list-valued one.
    pub fn is_list_valued(&self) -> bool {
        self.separator.is_some()
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("_col.{}", self.ordinal),
        }
    }
}

/// Field-level trimming applied after decoding, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trim {
    #[default]
    Both,
    Start,
    End,
    None,
}

impl Trim {
    pub fn apply(self, field: &str) -> &str {
        match self {
            Trim::Both => field.trim(),
            Trim::Start => field.trim_start(),
            Trim::End => field.trim_end(),
            Trim::None => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote_char: u8,
    /// When false, backslash escapes quotes instead of doubling.
    pub double_quote: bool,
    pub skip_rows: u64,
    pub skip_blank_rows: bool,
    pub header: bool,
    pub encoding: String,
    pub trim: Trim,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            delimiter: b',',
            quote_char: b'"',
            double_quote: true,
            skip_rows: 0,
            skip_blank_rows: true,
            header: true,
            encoding: "utf-8".to_string(),
            trim: Trim::Both,
        }
    }
}

/// Child-side foreign key: local columns referencing columns of another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    /// Indices into the defining table's columns.
    pub local_columns: Vec<usize>,
    pub local_names: Vec<String>,
    pub resource_url: String,
    pub referenced_column_names: Vec<String>,
}

/// Parent-side mirror of a foreign key, attached to the referenced table.
#[derive(Debug, Clone)]
pub struct ReferencedForeignKey {
    pub source_table_url: String,
    /// Index of the definition within the source table's `foreign_keys`.
    pub source_fk_index: usize,
    pub source_column_names: Vec<String>,
    /// Indices into the referenced table's columns.
    pub referenced_columns: Vec<usize>,
    pub referenced_column_names: Vec<String>,
}

impl PartialEq for ReferencedForeignKey {
    fn eq(&self, other: &Self) -> bool {
        self.source_table_url == other.source_table_url
            && self.source_column_names == other.source_column_names
            && self.referenced_column_names == other.referenced_column_names
    }
}

impl Eq for ReferencedForeignKey {}
