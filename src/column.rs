//! Per-column validation: null handling, list splitting, datatype parsing,
//! and the length/range/required/format constraint checks.

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::{
    datatype::{self, Datatype, Value},
    schema::Column,
};

/// A single finding for a cell, before row context is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellError {
    pub kind: String,
    pub content: String,
}

impl CellError {
    fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        CellError {
            kind: kind.into(),
            content: content.into(),
        }
    }
}

/// The result of validating one cell: accumulated errors plus the values
/// that parsed cleanly (list columns produce one value per item).
#[derive(Debug, Default)]
pub struct CellOutcome {
    pub errors: Vec<CellError>,
    pub values: Vec<Value>,
}

#[derive(Debug, Default)]
struct RangeBounds {
    min_inclusive: Option<Value>,
    max_inclusive: Option<Value>,
    min_exclusive: Option<Value>,
    max_exclusive: Option<Value>,
}

/// Owns one column's schema plus the artifacts derived from it (compiled
/// format regex, parsed range bounds).
#[derive(Debug)]
pub struct ColumnValidator {
    column: Column,
    bounds: RangeBounds,
    format_regex: Option<Regex>,
}

impl ColumnValidator {
    /// Builds the validator, parsing each textual range bound once under the
    /// column's datatype. A bound that does not parse is a metadata error.
    pub fn build(column: &Column) -> Result<Self> {
        let bounds = RangeBounds {
            min_inclusive: parse_bound(column, column.min_inclusive.as_deref(), "minInclusive")?,
            max_inclusive: parse_bound(column, column.max_inclusive.as_deref(), "maxInclusive")?,
            min_exclusive: parse_bound(column, column.min_exclusive.as_deref(), "minExclusive")?,
            max_exclusive: parse_bound(column, column.max_exclusive.as_deref(), "maxExclusive")?,
        };
        let format_regex = match &column.format {
            Some(format) if column.datatype.is_string_like() => match &format.pattern {
                Some(pattern) => Some(Regex::new(pattern).map_err(|err| {
                    anyhow!(
                        "invalid format pattern for column '{}': {err}",
                        column.display_name()
                    )
                })?),
                None => None,
            },
            _ => None,
        };
        Ok(ColumnValidator {
            column: column.clone(),
            bounds,
            format_regex,
        })
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    /// Validates one raw cell, returning errors and successfully parsed
    /// values. Items that fail to parse contribute an `invalid - <item>`
    /// sentinel so downstream consumers can see the slot was occupied.
    pub fn validate(&self, cell: &str) -> CellOutcome {
        let mut outcome = CellOutcome::default();

        if self.column.null_tokens.iter().any(|token| token == cell) {
            if self.column.required {
                outcome
                    .errors
                    .push(CellError::new("Required", cell.to_string()));
            }
            return outcome;
        }

        let items: Vec<&str> = match &self.column.separator {
            Some(separator) => cell.split(separator.as_str()).collect(),
            None => vec![cell],
        };

        for item in items {
            self.validate_item(item, &mut outcome);
        }
        outcome
    }

    fn validate_item(&self, item: &str, outcome: &mut CellOutcome) {
        let parsed = datatype::parse_value(self.column.datatype, self.column.format.as_ref(), item);
        let value = match parsed {
            Ok(value) => value,
            Err(err) => {
                let described = self
                    .column
                    .format
                    .as_ref()
                    .map(|f| f.describe_pattern())
                    .unwrap_or_else(|| "no format provided".to_string());
                outcome.errors.push(CellError::new(
                    self.column.datatype.error_kind(),
                    format!("'{item}' - {err} ({described})"),
                ));
                outcome.values.push(Value::Invalid(format!("invalid - {item}")));
                return;
            }
        };

        let before = outcome.errors.len();
        let string_form = value.string_form();
        self.check_lengths(&string_form, outcome);
        self.check_ranges(item, &value, outcome);
        if self.column.required && string_form.is_empty() {
            outcome
                .errors
                .push(CellError::new("Required", item.to_string()));
        }
        if let Some(regex) = &self.format_regex {
            if !regex.is_match(&string_form) {
                let pattern = regex.as_str();
                outcome.errors.push(CellError::new(
                    "format",
                    format!("'{item}' - does not match pattern '{pattern}'"),
                ));
            }
        }

        if outcome.errors.len() == before {
            outcome.values.push(value);
        }
    }

    fn check_lengths(&self, string_form: &str, outcome: &mut CellOutcome) {
        let actual = restricted_length(self.column.datatype, string_form);
        if let Some(expected) = self.column.length {
            if actual != expected {
                outcome.errors.push(CellError::new(
                    "length",
                    format!("'{string_form}' - length is not {expected}"),
                ));
            }
        }
        if let Some(min) = self.column.min_length {
            if actual < min {
                outcome.errors.push(CellError::new(
                    "minLength",
                    format!("'{string_form}' - length less than {min}"),
                ));
            }
        }
        if let Some(max) = self.column.max_length {
            if actual > max {
                outcome.errors.push(CellError::new(
                    "maxLength",
                    format!("'{string_form}' - length greater than {max}"),
                ));
            }
        }
    }

    fn check_ranges(&self, item: &str, value: &Value, outcome: &mut CellOutcome) {
        use std::cmp::Ordering::*;
        if let Some(bound) = &self.bounds.min_inclusive {
            if value.compare(bound) == Some(Less) {
                outcome.errors.push(CellError::new(
                    "minInclusive",
                    format!("'{item}' - less than {}", bound.display_form()),
                ));
            }
        }
        if let Some(bound) = &self.bounds.min_exclusive {
            if matches!(value.compare(bound), Some(Less | Equal)) {
                outcome.errors.push(CellError::new(
                    "minExclusive",
                    format!("'{item}' - less than or equal to {}", bound.display_form()),
                ));
            }
        }
        if let Some(bound) = &self.bounds.max_inclusive {
            if value.compare(bound) == Some(Greater) {
                outcome.errors.push(CellError::new(
                    "maxInclusive",
                    format!("'{item}' - greater than {}", bound.display_form()),
                ));
            }
        }
        if let Some(bound) = &self.bounds.max_exclusive {
            if matches!(value.compare(bound), Some(Greater | Equal)) {
                outcome.errors.push(CellError::new(
                    "maxExclusive",
                    format!(
                        "'{item}' - greater than or equal to {}",
                        bound.display_form()
                    ),
                ));
            }
        }
    }

    /// Checks an observed header cell against the column's titles for any
    /// language tag compatible with the column's language.
    pub fn validate_header(&self, observed: &str) -> Option<CellError> {
        let fallback;
        let titles: &[(String, Vec<String>)] = if self.column.titles.is_empty() {
            fallback = [(
                "und".to_string(),
                self.column.name.iter().cloned().collect::<Vec<_>>(),
            )];
            &fallback
        } else {
            &self.column.titles
        };

        let matched = titles.iter().any(|(lang, candidates)| {
            language_tags_match(lang, &self.column.lang)
                && candidates.iter().any(|title| title == observed)
        });
        if matched {
            None
        } else {
            Some(CellError::new("Invalid Header", observed.to_string()))
        }
    }
}

/// Two tags match when equal, when either is the undefined tag `und`, or
/// when one is a hyphen-delimited prefix of the other.
pub fn language_tags_match(left: &str, right: &str) -> bool {
    if left == right || left == "und" || right == "und" {
        return true;
    }
    let prefixed = |longer: &str, shorter: &str| {
        longer.len() > shorter.len()
            && longer.starts_with(shorter)
            && longer.as_bytes()[shorter.len()] == b'-'
    };
    prefixed(left, right) || prefixed(right, left)
}

/// Length used by the length facets: binary types measure decoded bytes,
/// everything else counts characters.
fn restricted_length(datatype: Datatype, string_form: &str) -> usize {
    match datatype {
        Datatype::Base64Binary => {
            let padding = string_form.chars().rev().take_while(|c| *c == '=').count();
            (string_form.len().saturating_sub(padding)) * 3 / 4
        }
        Datatype::HexBinary => string_form.len() / 2,
        _ => string_form.chars().count(),
    }
}

fn parse_bound(column: &Column, bound: Option<&str>, facet: &str) -> Result<Option<Value>> {
    let Some(raw) = bound else {
        return Ok(None);
    };
    let parsed = datatype::parse_value(column.datatype, None, raw).map_err(|err| {
        anyhow!(
            "{facet} bound '{raw}' does not parse as {} for column '{}': {err}",
            column.datatype.local_name(),
            column.display_name()
        )
    })?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn integer_column() -> Column {
        let mut column = Column::new(1);
        column.name = Some("count".to_string());
        column.datatype = Datatype::Integer;
        column
    }

    #[test]
    fn null_token_yields_no_values() {
        let mut column = integer_column();
        column.null_tokens = vec!["NA".to_string()];
        let validator = ColumnValidator::build(&column).unwrap();
        let outcome = validator.validate("NA");
        assert!(outcome.errors.is_empty());
        assert!(outcome.values.is_empty());
    }

    #[test]
    fn required_null_emits_required_error() {
        let mut column = integer_column();
        column.required = true;
        let validator = ColumnValidator::build(&column).unwrap();
        let outcome = validator.validate("");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, "Required");
        assert!(outcome.values.is_empty());
    }

    #[test]
    fn separator_produces_one_parse_per_item() {
        let mut column = integer_column();
        column.separator = Some(";".to_string());
        let validator = ColumnValidator::build(&column).unwrap();
        let outcome = validator.validate("1;2;oops;4");
        assert_eq!(outcome.values.len(), 4);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, "invalid_integer");
        assert!(matches!(&outcome.values[2], Value::Invalid(s) if s == "invalid - oops"));
    }

    #[test]
    fn parse_failure_message_names_missing_format() {
        let validator = ColumnValidator::build(&integer_column()).unwrap();
        let outcome = validator.validate("abc");
        assert!(outcome.errors[0].content.starts_with("'abc' - "));
        assert!(outcome.errors[0].content.ends_with("(no format provided)"));
    }

    #[test]
    fn range_bounds_flag_out_of_range_values() {
        let mut column = integer_column();
        column.min_inclusive = Some("5".to_string());
        column.max_exclusive = Some("10".to_string());
        let validator = ColumnValidator::build(&column).unwrap();

        assert_eq!(validator.validate("4").errors[0].kind, "minInclusive");
        assert!(validator.validate("5").errors.is_empty());
        assert!(validator.validate("9").errors.is_empty());
        assert_eq!(validator.validate("10").errors[0].kind, "maxExclusive");
    }

    #[test]
    fn unparseable_bound_is_a_build_error() {
        let mut column = integer_column();
        column.min_inclusive = Some("low".to_string());
        assert!(ColumnValidator::build(&column).is_err());
    }

    #[test]
    fn binary_lengths_measure_decoded_bytes() {
        assert_eq!(restricted_length(Datatype::Base64Binary, "aGVsbG8="), 5);
        assert_eq!(restricted_length(Datatype::HexBinary, "0fb7"), 2);
        assert_eq!(restricted_length(Datatype::String, "abc"), 3);
    }

    #[test]
    fn string_pattern_runs_as_regex() {
        let mut column = Column::new(1);
        column.name = Some("code".to_string());
        column.datatype = Datatype::String;
        column.format = Some(crate::datatype::Format::pattern_only("^[A-Z]{3}$"));
        let validator = ColumnValidator::build(&column).unwrap();
        assert!(validator.validate("ABC").errors.is_empty());
        assert_eq!(validator.validate("abc").errors[0].kind, "format");
    }

    #[test]
    fn header_matches_titles_through_language_rules() {
        let mut column = Column::new(2);
        column.name = Some("age".to_string());
        column.lang = "en".to_string();
        column.titles = vec![
            ("en-GB".to_string(), vec!["Age".to_string()]),
            ("fr".to_string(), vec!["Âge".to_string()]),
        ];
        let validator = ColumnValidator::build(&column).unwrap();
        assert!(validator.validate_header("Age").is_none());
        // "fr" does not match the column language, so its titles do not count.
        let error = validator.validate_header("Âge").unwrap();
        assert_eq!(error.kind, "Invalid Header");
        assert_eq!(error.content, "Âge");
    }

    #[test]
    fn language_tag_matching_rules() {
        assert!(language_tags_match("en", "en-GB"));
        assert!(language_tags_match("en-GB", "en"));
        assert!(language_tags_match("x", "und"));
        assert!(!language_tags_match("en", "fr"));
        assert!(!language_tags_match("enx", "en"));
    }
}
