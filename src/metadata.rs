//! Metadata intake: turns a normalised CSV-W metadata document into the
//! in-memory [`TableGroup`].
//!
//! The upstream normaliser has already resolved URIs, expanded string
//! shorthands into object/array forms, and merged `@context` noise away; this
//! module maps the remaining object tree onto [`crate::schema`] types.
//! Problems found here are metadata errors: fatal for the affected table,
//! harmless for its siblings.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value as Json};
use url::Url;

use crate::{
    datatype::{Datatype, Format},
    report::{Issue, WarningsAndErrors},
    schema::{
        Column, Dialect, ForeignKeyDefinition, ReferencedForeignKey, Table, TableGroup,
        TableSchema, Trim,
    },
};

pub struct IntakeOutcome {
    pub group: TableGroup,
    pub issues: WarningsAndErrors,
}

/// Builds the table group from a parsed metadata document. Tables with
/// metadata errors are reported and excluded; the rest proceed to validation.
pub fn table_group_from_json(document: &Json, base: &Url) -> Result<IntakeOutcome> {
    let root = document
        .as_object()
        .ok_or_else(|| anyhow!("metadata root must be a JSON object"))?;

    let table_entries: Vec<&Json> = match root.get("tables") {
        Some(Json::Array(entries)) => entries.iter().collect(),
        Some(other) => bail!("'tables' must be an array, found {other}"),
        // A single-table document carries `url` at the root.
        None if root.contains_key("url") => vec![document],
        None => bail!("metadata document declares no tables"),
    };

    let group_inherited = Inherited::default().overlay(root);
    let group_dialect = root.get("dialect");

    let mut issues = WarningsAndErrors::new();
    let mut tables = Vec::new();
    for entry in table_entries {
        match build_table(entry, base, &group_inherited, group_dialect) {
            Ok(table) => tables.push(table),
            Err(err) => {
                let url = entry
                    .as_object()
                    .and_then(|o| o.get("url"))
                    .and_then(Json::as_str)
                    .unwrap_or("<unknown>");
                issues.error(Issue::metadata(format!("{err:#}")).with_csv_path(url));
            }
        }
    }

    attach_referenced_foreign_keys(&mut tables, &mut issues);

    Ok(IntakeOutcome {
        group: TableGroup { tables },
        issues,
    })
}

/// Resolves every table's foreign keys against the loaded group and attaches
/// the parent-side mirrors. Tables whose foreign keys cannot be resolved are
/// dropped, along with any mirrors they contributed.
fn attach_referenced_foreign_keys(tables: &mut Vec<Table>, issues: &mut WarningsAndErrors) {
    let mut mirrors: Vec<(usize, ReferencedForeignKey)> = Vec::new();
    let mut bad: Vec<usize> = Vec::new();

    for (source_idx, table) in tables.iter().enumerate() {
        for (fk_index, fk) in table.schema.foreign_keys.iter().enumerate() {
            let Some(target_idx) = tables.iter().position(|t| t.url == fk.resource_url) else {
                issues.error(
                    Issue::metadata(format!(
                        "foreign key references unknown table '{}'",
                        fk.resource_url
                    ))
                    .with_csv_path(&table.url),
                );
                bad.push(source_idx);
                continue;
            };
            let target = &tables[target_idx];
            let mut referenced_columns = Vec::with_capacity(fk.referenced_column_names.len());
            let mut unresolved = None;
            for name in &fk.referenced_column_names {
                match target.schema.column_index(name) {
                    Some(idx) => referenced_columns.push(idx),
                    None => {
                        unresolved = Some(name.clone());
                        break;
                    }
                }
            }
            if let Some(name) = unresolved {
                issues.error(
                    Issue::metadata(format!(
                        "foreign key references unknown column '{name}' in table '{}'",
                        target.url
                    ))
                    .with_csv_path(&table.url),
                );
                bad.push(source_idx);
                continue;
            }
            mirrors.push((
                target_idx,
                ReferencedForeignKey {
                    source_table_url: table.url.clone(),
                    source_fk_index: fk_index,
                    source_column_names: fk.local_names.clone(),
                    referenced_columns,
                    referenced_column_names: fk.referenced_column_names.clone(),
                },
            ));
        }
    }

    for (target_idx, mirror) in mirrors {
        if !bad.contains(&target_idx) {
            let source_bad = tables
                .iter()
                .position(|t| t.url == mirror.source_table_url)
                .is_some_and(|idx| bad.contains(&idx));
            if !source_bad {
                tables[target_idx].referenced_foreign_keys.push(mirror);
            }
        }
    }

    let mut idx = 0;
    tables.retain(|_| {
        let keep = !bad.contains(&idx);
        idx += 1;
        keep
    });
}

fn build_table(
    entry: &Json,
    base: &Url,
    group_inherited: &Inherited,
    group_dialect: Option<&Json>,
) -> Result<Table> {
    let obj = entry
        .as_object()
        .ok_or_else(|| anyhow!("table entry must be a JSON object"))?;
    let raw_url = obj
        .get("url")
        .and_then(Json::as_str)
        .ok_or_else(|| anyhow!("table entry is missing its 'url'"))?;
    let url = base
        .join(raw_url)
        .with_context(|| format!("resolving table url '{raw_url}'"))?;

    let inherited = group_inherited.overlay(obj);
    let dialect = parse_dialect(group_dialect, obj.get("dialect"))?;

    let schema_obj = obj.get("tableSchema").and_then(Json::as_object);
    let schema = match schema_obj {
        Some(schema_obj) => build_schema(schema_obj, base, &inherited)?,
        None => TableSchema::default(),
    };

    Ok(Table {
        url: url.to_string(),
        id: obj
            .get("@id")
            .or_else(|| obj.get("id"))
            .and_then(Json::as_str)
            .map(str::to_string),
        suppress_output: bool_prop(obj, "suppressOutput").unwrap_or(false),
        notes: obj.get("notes").cloned(),
        schema,
        dialect,
        referenced_foreign_keys: Vec::new(),
    })
}

fn build_schema(obj: &Map<String, Json>, base: &Url, inherited: &Inherited) -> Result<TableSchema> {
    let inherited = inherited.overlay(obj);
    let mut columns = Vec::new();
    if let Some(Json::Array(raw_columns)) = obj.get("columns") {
        for (idx, raw) in raw_columns.iter().enumerate() {
            columns.push(build_column(raw, idx + 1, &inherited)?);
        }
    }

    let schema = TableSchema {
        primary_key: resolve_primary_key(obj.get("primaryKey"), &columns)?,
        foreign_keys: resolve_foreign_keys(obj.get("foreignKeys"), &columns, base)?,
        columns,
    };
    Ok(schema)
}

fn build_column(raw: &Json, ordinal: usize, inherited: &Inherited) -> Result<Column> {
    let obj = raw
        .as_object()
        .ok_or_else(|| anyhow!("column {ordinal} must be a JSON object"))?;
    let inherited = inherited.overlay(obj);
    let mut column = Column::new(ordinal);

    column.titles = parse_titles(obj.get("titles"))?;
    column.name = obj
        .get("name")
        .and_then(Json::as_str)
        .map(str::to_string)
        .or_else(|| {
            column
                .titles
                .first()
                .and_then(|(_, titles)| titles.first())
                .cloned()
        });
    column.id = obj
        .get("@id")
        .or_else(|| obj.get("id"))
        .and_then(Json::as_str)
        .map(str::to_string);
    column.virtual_column = bool_prop(obj, "virtual").unwrap_or(false);
    column.suppress_output = bool_prop(obj, "suppressOutput").unwrap_or(false);

    if let Some(datatype) = &inherited.datatype {
        apply_datatype(&mut column, datatype)?;
    }
    if let Some(null_tokens) = &inherited.null_tokens {
        if !null_tokens.is_empty() {
            column.null_tokens = null_tokens.clone();
        }
    }
    column.separator = inherited.separator.clone();
    column.required = inherited.required.unwrap_or(false);
    column.ordered = inherited.ordered.unwrap_or(false);
    if let Some(lang) = &inherited.lang {
        column.lang = lang.clone();
    }
    if let Some(default) = &inherited.default {
        column.default = default.clone();
    }
    column.about_url = inherited.about_url.clone();
    column.property_url = inherited.property_url.clone();
    column.value_url = inherited.value_url.clone();
    column.text_direction = inherited.text_direction.clone();

    Ok(column)
}

/// CSV-W shorthand names that do not match their XSD local name.
fn expand_shorthand(name: &str) -> &str {
    match name {
        "number" => "double",
        "binary" => "base64Binary",
        "datetime" => "dateTime",
        "any" => "anyAtomicType",
        "xml" => "XMLLiteral",
        "html" => "HTML",
        "json" => "JSON",
        other => other,
    }
}

fn apply_datatype(column: &mut Column, datatype: &Json) -> Result<()> {
    let obj = match datatype {
        Json::String(name) => {
            column.datatype = resolve_datatype_name(name)?;
            return Ok(());
        }
        Json::Object(obj) => obj,
        other => bail!("datatype must be a string or object, found {other}"),
    };

    let name = obj
        .get("base")
        .or_else(|| obj.get("@id"))
        .and_then(Json::as_str)
        .unwrap_or("string");
    column.datatype = resolve_datatype_name(name)?;

    column.format = match obj.get("format") {
        None | Some(Json::Null) => None,
        Some(Json::String(pattern)) => Some(Format::pattern_only(pattern)),
        Some(Json::Object(format_obj)) => Some(Format {
            pattern: format_obj
                .get("pattern")
                .and_then(Json::as_str)
                .map(str::to_string),
            decimal_char: char_prop(format_obj, "decimalChar"),
            group_char: char_prop(format_obj, "groupChar"),
        }),
        Some(other) => bail!("datatype format must be a string or object, found {other}"),
    };

    column.length = usize_prop(obj, "length");
    column.min_length = usize_prop(obj, "minLength");
    column.max_length = usize_prop(obj, "maxLength");
    column.min_inclusive = bound_prop(obj, "minInclusive").or_else(|| bound_prop(obj, "minimum"));
    column.max_inclusive = bound_prop(obj, "maxInclusive").or_else(|| bound_prop(obj, "maximum"));
    column.min_exclusive = bound_prop(obj, "minExclusive");
    column.max_exclusive = bound_prop(obj, "maxExclusive");
    Ok(())
}

fn resolve_datatype_name(name: &str) -> Result<Datatype> {
    let datatype = if name.contains(':') && name.contains("//") || name.contains('#') {
        Datatype::from_uri(name)
    } else {
        let local = name.strip_prefix("xsd:").unwrap_or(name);
        Datatype::from_local_name(expand_shorthand(local))
    };
    datatype.ok_or_else(|| anyhow!("unknown datatype '{name}'"))
}

fn parse_titles(raw: Option<&Json>) -> Result<Vec<(String, Vec<String>)>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    match raw {
        Json::String(title) => Ok(vec![("und".to_string(), vec![title.clone()])]),
        Json::Array(entries) => {
            let titles = entries
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .collect();
            Ok(vec![("und".to_string(), titles)])
        }
        Json::Object(by_lang) => {
            let mut titles = Vec::new();
            for (lang, value) in by_lang {
                let entries = match value {
                    Json::String(one) => vec![one.clone()],
                    Json::Array(many) => many
                        .iter()
                        .filter_map(Json::as_str)
                        .map(str::to_string)
                        .collect(),
                    other => bail!("titles for '{lang}' must be a string or array, found {other}"),
                };
                titles.push((lang.clone(), entries));
            }
            Ok(titles)
        }
        other => bail!("titles must be a string, array, or object, found {other}"),
    }
}

fn resolve_primary_key(raw: Option<&Json>, columns: &[Column]) -> Result<Vec<usize>> {
    let names = string_or_list(raw)?;
    names
        .iter()
        .map(|name| {
            columns
                .iter()
                .position(|c| c.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| anyhow!("primary key references unknown column '{name}'"))
        })
        .collect()
}

fn resolve_foreign_keys(
    raw: Option<&Json>,
    columns: &[Column],
    base: &Url,
) -> Result<Vec<ForeignKeyDefinition>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let entries = raw
        .as_array()
        .ok_or_else(|| anyhow!("'foreignKeys' must be an array"))?;

    let mut foreign_keys = Vec::with_capacity(entries.len());
    for entry in entries {
        let obj = entry
            .as_object()
            .ok_or_else(|| anyhow!("foreign key entry must be a JSON object"))?;
        let local_names = string_or_list(obj.get("columnReference"))?;
        if local_names.is_empty() {
            bail!("foreign key is missing its 'columnReference'");
        }
        let mut local_columns = Vec::with_capacity(local_names.len());
        for name in &local_names {
            let idx = columns
                .iter()
                .position(|c| c.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| anyhow!("foreign key references unknown column '{name}'"))?;
            if columns[idx].is_list_valued() {
                bail!("foreign key references list column '{name}'");
            }
            local_columns.push(idx);
        }

        let reference = obj
            .get("reference")
            .and_then(Json::as_object)
            .ok_or_else(|| anyhow!("foreign key is missing its 'reference'"))?;
        let resource = reference
            .get("resource")
            .and_then(Json::as_str)
            .ok_or_else(|| anyhow!("foreign key reference is missing its 'resource'"))?;
        let resource_url = base
            .join(resource)
            .with_context(|| format!("resolving foreign key resource '{resource}'"))?;
        let referenced_column_names = string_or_list(reference.get("columnReference"))?;
        if referenced_column_names.len() != local_names.len() {
            bail!(
                "foreign key has {} local column(s) but references {}",
                local_names.len(),
                referenced_column_names.len()
            );
        }

        foreign_keys.push(ForeignKeyDefinition {
            local_columns,
            local_names,
            resource_url: resource_url.to_string(),
            referenced_column_names,
        });
    }
    Ok(foreign_keys)
}

fn parse_dialect(group: Option<&Json>, table: Option<&Json>) -> Result<Dialect> {
    let mut dialect = Dialect::default();
    for layer in [group, table].into_iter().flatten() {
        let obj = layer
            .as_object()
            .ok_or_else(|| anyhow!("dialect must be a JSON object"))?;
        apply_dialect_layer(&mut dialect, obj)?;
    }
    Ok(dialect)
}

fn apply_dialect_layer(dialect: &mut Dialect, obj: &Map<String, Json>) -> Result<()> {
    if let Some(delimiter) = char_prop(obj, "delimiter") {
        if !delimiter.is_ascii() {
            bail!("dialect delimiter must be ASCII");
        }
        dialect.delimiter = delimiter as u8;
    }
    if let Some(quote) = obj.get("quoteChar") {
        match quote {
            Json::Null => dialect.quote_char = 0,
            Json::String(s) if s.chars().next().is_some_and(|c| c.is_ascii()) => {
                dialect.quote_char = s.as_bytes()[0];
            }
            other => bail!("dialect quoteChar must be an ASCII character or null, found {other}"),
        }
    }
    if let Some(double_quote) = bool_prop(obj, "doubleQuote") {
        dialect.double_quote = double_quote;
    }
    if let Some(skip_rows) = obj.get("skipRows").and_then(Json::as_u64) {
        dialect.skip_rows = skip_rows;
    }
    if let Some(skip_blank) = bool_prop(obj, "skipBlankRows") {
        dialect.skip_blank_rows = skip_blank;
    }
    if let Some(header) = bool_prop(obj, "header") {
        dialect.header = header;
    }
    if let Some(encoding) = obj.get("encoding").and_then(Json::as_str) {
        dialect.encoding = encoding.to_string();
    }
    if let Some(trim) = obj.get("trim") {
        dialect.trim = match trim {
            Json::Bool(true) => Trim::Both,
            Json::Bool(false) => Trim::None,
            Json::String(s) if s == "true" => Trim::Both,
            Json::String(s) if s == "false" => Trim::None,
            Json::String(s) if s == "start" => Trim::Start,
            Json::String(s) if s == "end" => Trim::End,
            other => bail!("dialect trim must be true, false, 'start', or 'end', found {other}"),
        };
    }
    Ok(())
}

/// The inheritable properties flowing group → table → schema → column.
#[derive(Debug, Clone, Default)]
struct Inherited {
    about_url: Option<String>,
    property_url: Option<String>,
    value_url: Option<String>,
    datatype: Option<Json>,
    default: Option<String>,
    lang: Option<String>,
    null_tokens: Option<Vec<String>>,
    ordered: Option<bool>,
    required: Option<bool>,
    separator: Option<String>,
    text_direction: Option<String>,
}

impl Inherited {
    fn overlay(&self, obj: &Map<String, Json>) -> Inherited {
        let string = |key: &str| obj.get(key).and_then(Json::as_str).map(str::to_string);
        Inherited {
            about_url: string("aboutUrl").or_else(|| self.about_url.clone()),
            property_url: string("propertyUrl").or_else(|| self.property_url.clone()),
            value_url: string("valueUrl").or_else(|| self.value_url.clone()),
            datatype: obj.get("datatype").cloned().or_else(|| self.datatype.clone()),
            default: string("default").or_else(|| self.default.clone()),
            lang: string("lang").or_else(|| self.lang.clone()),
            null_tokens: match obj.get("null") {
                Some(Json::String(token)) => Some(vec![token.clone()]),
                Some(Json::Array(tokens)) => Some(
                    tokens
                        .iter()
                        .filter_map(Json::as_str)
                        .map(str::to_string)
                        .collect(),
                ),
                _ => self.null_tokens.clone(),
            },
            ordered: bool_prop(obj, "ordered").or(self.ordered),
            required: bool_prop(obj, "required").or(self.required),
            separator: string("separator").or_else(|| self.separator.clone()),
            text_direction: string("textDirection").or_else(|| self.text_direction.clone()),
        }
    }
}

fn bool_prop(obj: &Map<String, Json>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Json::as_bool)
}

fn usize_prop(obj: &Map<String, Json>, key: &str) -> Option<usize> {
    obj.get(key).and_then(Json::as_u64).map(|v| v as usize)
}

fn char_prop(obj: &Map<String, Json>, key: &str) -> Option<char> {
    obj.get(key)
        .and_then(Json::as_str)
        .and_then(|s| s.chars().next())
}

/// Numeric and date bounds may arrive as JSON numbers or strings; both are
/// kept textual and parsed later under the column's datatype.
fn bound_prop(obj: &Map<String, Json>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Json::String(s)) => Some(s.clone()),
        Some(Json::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_list(raw: Option<&Json>) -> Result<Vec<String>> {
    match raw {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::String(one)) => Ok(vec![one.clone()]),
        Some(Json::Array(many)) => many
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("column reference entries must be strings, found {v}"))
            })
            .collect(),
        Some(other) => bail!("expected a string or array of strings, found {other}"),
    }
}
