//! Row validation: applies the column validators across one CSV record and
//! extracts the primary-key and foreign-key tuples.

use anyhow::Result;

use crate::{
    column::ColumnValidator,
    key::{KeyComponent, KeyValue},
    report::Issue,
    schema::Table,
};

/// Everything the pipeline needs from one validated record.
#[derive(Debug)]
pub struct RowOutcome {
    pub record_number: u64,
    pub errors: Vec<Issue>,
    pub primary_key: Option<KeyValue>,
    /// One key per foreign-key definition, in declaration order.
    pub child_keys: Vec<KeyValue>,
    /// One key per referenced foreign key pointing at this table.
    pub parent_reference_keys: Vec<KeyValue>,
}

/// Pure per-row validation state, shared read-only across worker threads.
#[derive(Debug)]
pub struct RowValidator {
    validators: Vec<ColumnValidator>,
    /// Schema-column index to position within the physical CSV record;
    /// `None` for virtual columns, which have no cell of their own.
    physical_index: Vec<Option<usize>>,
    csv_columns: usize,
    pk_columns: Vec<usize>,
    child_fk_columns: Vec<Vec<usize>>,
    parent_ref_columns: Vec<Vec<usize>>,
}

impl RowValidator {
    /// Builds per-column validators for a table. Fails on metadata-level
    /// problems such as unparseable range bounds or bad format patterns.
    pub fn build(table: &Table) -> Result<Self> {
        let validators = table
            .schema
            .columns
            .iter()
            .map(ColumnValidator::build)
            .collect::<Result<Vec<_>>>()?;
        let mut next_physical = 0usize;
        let physical_index = table
            .schema
            .columns
            .iter()
            .map(|column| {
                if column.virtual_column {
                    None
                } else {
                    let slot = next_physical;
                    next_physical += 1;
                    Some(slot)
                }
            })
            .collect();
        Ok(RowValidator {
            physical_index,
            csv_columns: table.schema.csv_column_count(),
            pk_columns: table.schema.primary_key.clone(),
            child_fk_columns: table
                .schema
                .foreign_keys
                .iter()
                .map(|fk| fk.local_columns.clone())
                .collect(),
            parent_ref_columns: table
                .referenced_foreign_keys
                .iter()
                .map(|fk| fk.referenced_columns.clone())
                .collect(),
            validators,
        })
    }

    /// Number of physical cells a record must carry.
    pub fn expected_fields(&self) -> usize {
        self.csv_columns
    }

    /// The physical cell backing a schema column, or the empty string for
    /// virtual columns and records that ran short.
    fn field_for<'a>(&self, fields: &'a [String], schema_idx: usize) -> &'a str {
        self.physical_index[schema_idx]
            .and_then(|slot| fields.get(slot))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn validate_row(&self, record_number: u64, fields: &[String]) -> RowOutcome {
        let mut errors = Vec::new();
        let mut per_column_values = Vec::with_capacity(self.validators.len());

        for (idx, validator) in self.validators.iter().enumerate() {
            if validator.column().virtual_column {
                per_column_values.push(Vec::new());
                continue;
            }
            let cell = self.field_for(fields, idx);
            let outcome = validator.validate(cell);
            for error in outcome.errors {
                errors.push(Issue::cell(
                    error.kind,
                    record_number,
                    validator.column().ordinal,
                    error.content,
                    validator.column().required,
                ));
            }
            per_column_values.push(outcome.values);
        }

        RowOutcome {
            record_number,
            errors,
            primary_key: self.assemble_key(&self.pk_columns, &per_column_values),
            // Both lists stay parallel to their schema declarations.
            child_keys: self
                .child_fk_columns
                .iter()
                .map(|cols| self.assemble_key(cols, &per_column_values).unwrap_or_default())
                .collect(),
            parent_reference_keys: self
                .parent_ref_columns
                .iter()
                .map(|cols| self.assemble_key(cols, &per_column_values).unwrap_or_default())
                .collect(),
        }
    }

    /// Key-only extraction used by the pass-2 duplicate scan; runs the same
    /// per-column parsing but discards the findings.
    pub fn primary_key_of(&self, fields: &[String]) -> Option<KeyValue> {
        if self.pk_columns.is_empty() {
            return None;
        }
        let components = self
            .pk_columns
            .iter()
            .map(|&idx| {
                let validator = &self.validators[idx];
                if validator.column().virtual_column {
                    return KeyComponent::from_values(&[]);
                }
                let cell = self.field_for(fields, idx);
                KeyComponent::from_values(&validator.validate(cell).values)
            })
            .collect();
        Some(KeyValue::new(components))
    }

    fn assemble_key(
        &self,
        columns: &[usize],
        per_column_values: &[Vec<crate::datatype::Value>],
    ) -> Option<KeyValue> {
        if columns.is_empty() {
            return None;
        }
        let components = columns
            .iter()
            .map(|&idx| KeyComponent::from_values(&per_column_values[idx]))
            .collect();
        Some(KeyValue::new(components))
    }

    /// Validates the header record: empty and duplicated names become
    /// warnings, titles that match no declared column become errors.
    pub fn header_issues(
        &self,
        record_number: u64,
        fields: &[String],
    ) -> (Vec<Issue>, Vec<Issue>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for (idx, validator) in self
            .validators
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.column().virtual_column)
        {
            let ordinal = validator.column().ordinal;
            let observed = self.field_for(fields, idx);
            if observed.is_empty() {
                warnings.push(Issue::header("Empty column name", ordinal, "").with_row(record_number));
            } else if seen.contains(&observed) {
                warnings.push(
                    Issue::header("Duplicate column name", ordinal, observed)
                        .with_row(record_number),
                );
            }
            seen.push(observed);

            if let Some(error) = validator.validate_header(observed) {
                errors.push(Issue::header(error.kind, ordinal, error.content).with_row(record_number));
            }
        }
        (warnings, errors)
    }
}
