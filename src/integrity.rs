//! Cross-table referential integrity, run after every table has completed
//! both of its passes.

use std::collections::HashMap;

use log::debug;

use crate::{
    key::{KeyContext, KeyValue},
    report::{CATEGORY_SCHEMA, Issue, WarningsAndErrors},
    schema::TableGroup,
    table::TableOutcome,
};

/// Resolves every foreign-key definition's child key set against its target
/// table's parent key set. Child keys with a null component are not
/// references and are skipped.
pub fn check_foreign_keys(group: &TableGroup, outcomes: &[TableOutcome]) -> WarningsAndErrors {
    let mut report = WarningsAndErrors::new();

    for (table_idx, table) in group.tables.iter().enumerate() {
        for (fk_idx, fk) in table.schema.foreign_keys.iter().enumerate() {
            let child_values = &outcomes[table_idx].child_fk_values[fk_idx];
            let Some(parent_values) = parent_values_for(group, outcomes, &table.url, fk_idx, &fk.resource_url)
            else {
                debug!(
                    "No parent key set collected for foreign key {fk_idx} of {}; target {} missing",
                    table.url, fk.resource_url
                );
                continue;
            };

            let mut findings: Vec<(u64, Issue)> = Vec::new();
            for (key, &row) in child_values {
                if !key.is_complete() {
                    continue;
                }
                match parent_values.get(key) {
                    None => findings.push((
                        row,
                        Issue::new(
                            "unmatched_foreign_key_reference",
                            CATEGORY_SCHEMA,
                            key.display_joined(),
                        )
                        .with_row(row)
                        .with_csv_path(&table.url),
                    )),
                    Some(context) if context.is_duplicate => findings.push((
                        row,
                        Issue::new("multiple_matched_rows", CATEGORY_SCHEMA, key.display_joined())
                            .with_row(row)
                            .with_csv_path(&table.url),
                    )),
                    Some(_) => {}
                }
            }
            findings.sort_by_key(|(row, _)| *row);
            report.errors.extend(findings.into_iter().map(|(_, issue)| issue));
        }
    }
    report
}

/// Finds the parent key set the target table collected for this particular
/// foreign key, matching by source table and definition index.
fn parent_values_for<'a>(
    group: &TableGroup,
    outcomes: &'a [TableOutcome],
    source_url: &str,
    source_fk_index: usize,
    resource_url: &str,
) -> Option<&'a HashMap<KeyValue, KeyContext>> {
    let target_idx = group.tables.iter().position(|t| t.url == resource_url)?;
    let target = &group.tables[target_idx];
    let mirror_idx = target
        .referenced_foreign_keys
        .iter()
        .position(|m| m.source_table_url == source_url && m.source_fk_index == source_fk_index)?;
    outcomes[target_idx].parent_ref_values.get(mirror_idx)
}
