//! Key values used for primary-key uniqueness and foreign-key lookup.
//!
//! A key is an ordered tuple of per-column components. Each component keeps
//! two string forms: the canonical form (UTC-normalised instants, trailing
//! zeros collapsed) that drives equality and hashing, and a display form
//! echoed back when a key appears in an error message.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use itertools::Itertools;

use crate::datatype::Value;

#[derive(Debug, Clone, Eq)]
pub struct KeyComponent {
    canonical: String,
    display: String,
}

impl KeyComponent {
    /// Concatenates the string forms of a column's parsed values; list
    /// columns contribute every item, joined with the empty string. Sentinel
    /// values from failed parses are skipped so a broken cell cannot
    /// manufacture spurious key matches.
    pub fn from_values(values: &[Value]) -> Self {
        let mut canonical = String::new();
        let mut display = String::new();
        for value in values.iter().filter(|v| !v.is_invalid()) {
            canonical.push_str(&value.key_form());
            display.push_str(&value.display_form());
        }
        KeyComponent { canonical, display }
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl PartialEq for KeyComponent {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Hash for KeyComponent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

/// An ordered tuple of components identifying a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyValue {
    pub components: Vec<KeyComponent>,
}

impl KeyValue {
    pub fn new(components: Vec<KeyComponent>) -> Self {
        KeyValue { components }
    }

    /// A key participates in integrity checks only when every component is
    /// populated; a null anywhere makes the whole key a non-reference.
    pub fn is_complete(&self) -> bool {
        !self.components.is_empty() && self.components.iter().all(|c| !c.is_empty())
    }

    /// Stable 64-bit hash used for the pass-1 primary-key buckets.
    pub fn bucket_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// The comma-joined display form used in `duplicate_key` messages.
    pub fn display_joined(&self) -> String {
        self.components.iter().map(KeyComponent::display).join(", ")
    }
}

/// A key with the row it came from. Duplication is tracked alongside, not
/// inside, the key: maps from [`KeyValue`] to this record keep hashing and
/// equality independent of row numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyContext {
    pub row: u64,
    pub is_duplicate: bool,
}

impl KeyContext {
    pub fn first_seen(row: u64) -> Self {
        KeyContext {
            row,
            is_duplicate: false,
        }
    }

    pub fn duplicated(self) -> Self {
        KeyContext {
            row: self.row,
            is_duplicate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{Datatype, parse_value};

    fn component(datatype: Datatype, raw: &str) -> KeyComponent {
        KeyComponent::from_values(&[parse_value(datatype, None, raw).expect("parse value")])
    }

    #[test]
    fn equal_decimals_produce_equal_components() {
        let one = component(Datatype::Decimal, "1.0");
        let other = component(Datatype::Decimal, "1.00");
        assert_eq!(one, other);
        let key_a = KeyValue::new(vec![one]);
        let key_b = KeyValue::new(vec![other]);
        assert_eq!(key_a.bucket_hash(), key_b.bucket_hash());
    }

    #[test]
    fn same_instant_different_offset_compares_equal() {
        let local = component(Datatype::DateTimeType, "2004-04-12T20:20+02:00");
        let zulu = component(Datatype::DateTimeType, "2004-04-12T18:20Z");
        assert_eq!(local, zulu);
    }

    #[test]
    fn display_preserves_the_lexical_datetime() {
        let annotated = component(Datatype::DateTimeType, "2004-04-12T20:20+02:00[UTC+02:00]");
        assert_eq!(annotated.display(), "2004-04-12T20:20+02:00[UTC+02:00]");
    }

    #[test]
    fn invalid_sentinels_are_excluded_from_components() {
        let values = vec![
            crate::datatype::Value::Invalid("invalid - x".to_string()),
            crate::datatype::Value::Str("ok".to_string()),
        ];
        let component = KeyComponent::from_values(&values);
        assert_eq!(component.display(), "ok");
    }

    #[test]
    fn completeness_requires_every_component() {
        let full = KeyValue::new(vec![component(Datatype::String, "a")]);
        assert!(full.is_complete());
        let partial = KeyValue::new(vec![
            component(Datatype::String, "a"),
            KeyComponent::from_values(&[]),
        ]);
        assert!(!partial.is_complete());
        assert!(!KeyValue::default().is_complete());
    }
}
