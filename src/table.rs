//! Per-table validation pipeline.
//!
//! Pass 1 streams records off a single sequential reader, groups them into
//! batches, and fans the batches out to a small worker pool; outcomes fold
//! back into the accumulator in arrival order, which is safe because every
//! per-row contribution commutes. Primary keys are tracked as hash buckets
//! only. Pass 2 re-reads just the rows whose hashes collided and compares
//! the actual key values, so memory stays bounded by the collision set and a
//! hash collision can never surface as a `duplicate_key` on its own.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use anyhow::{Context, Result};
use log::{debug, info};
use url::Url;

use crate::{
    fetch::ByteSource,
    io_utils,
    key::{KeyContext, KeyValue},
    report::{Issue, WarningsAndErrors},
    row::{RowOutcome, RowValidator},
    schema::Table,
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Rows per dispatched batch.
    pub row_grouping: usize,
    /// Maximum batches in flight.
    pub parallelism: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            row_grouping: 1000,
            parallelism: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }
}

/// Everything a completed table contributes to cross-table integrity.
#[derive(Debug, Default)]
pub struct TableOutcome {
    pub report: WarningsAndErrors,
    /// Per foreign-key definition: child key value to first defining row.
    pub child_fk_values: Vec<HashMap<KeyValue, u64>>,
    /// Per referenced foreign key: candidate parent key values.
    pub parent_ref_values: Vec<HashMap<KeyValue, KeyContext>>,
}

struct WorkItem {
    record_number: u64,
    fields: Vec<String>,
}

struct TableAccumulator {
    report: WarningsAndErrors,
    child_fk_values: Vec<HashMap<KeyValue, u64>>,
    parent_ref_values: Vec<HashMap<KeyValue, KeyContext>>,
    pk_buckets: HashMap<u64, Vec<u64>>,
}

impl TableAccumulator {
    fn new(table: &Table) -> Self {
        TableAccumulator {
            report: WarningsAndErrors::new(),
            child_fk_values: vec![HashMap::new(); table.schema.foreign_keys.len()],
            parent_ref_values: vec![HashMap::new(); table.referenced_foreign_keys.len()],
            pk_buckets: HashMap::new(),
        }
    }

    fn fold(&mut self, outcome: RowOutcome) {
        self.report.errors.extend(outcome.errors);
        for (idx, key) in outcome.child_keys.into_iter().enumerate() {
            self.child_fk_values[idx]
                .entry(key)
                .or_insert(outcome.record_number);
        }
        for (idx, key) in outcome.parent_reference_keys.into_iter().enumerate() {
            self.parent_ref_values[idx]
                .entry(key)
                .and_modify(|existing| *existing = existing.duplicated())
                .or_insert_with(|| KeyContext::first_seen(outcome.record_number));
        }
        if let Some(key) = outcome.primary_key {
            self.pk_buckets
                .entry(key.bucket_hash())
                .or_default()
                .push(outcome.record_number);
        }
    }
}

/// Validates one table end to end and returns its accumulated state.
pub fn run_table(
    table: &Table,
    source: &dyn ByteSource,
    options: &PipelineOptions,
) -> TableOutcome {
    let mut outcome = TableOutcome::default();
    let prepared = RowValidator::build(table)
        .and_then(|validator| Ok((io_utils::resolve_encoding(&table.dialect.encoding)?, validator)));
    match prepared {
        // Schema-level problems are metadata errors, fatal for this table only.
        Err(err) => outcome.report.error(Issue::metadata(format!("{err:#}"))),
        Ok((encoding, validator)) => {
            match run_table_inner(table, &validator, encoding, source, options) {
                Ok(completed) => outcome = completed,
                Err(err) => {
                    let kind = if table.url.starts_with("file:") {
                        "file_not_found"
                    } else {
                        "csv_cannot_be_downloaded"
                    };
                    outcome.report.error(Issue::new(
                        kind,
                        crate::report::CATEGORY_STRUCTURE,
                        format!("{err:#}"),
                    ));
                }
            }
        }
    }
    for issue in outcome
        .report
        .warnings
        .iter_mut()
        .chain(outcome.report.errors.iter_mut())
    {
        if issue.csv_path.is_none() {
            issue.csv_path = Some(table.url.clone());
        }
    }
    outcome
}

fn run_table_inner(
    table: &Table,
    validator: &RowValidator,
    encoding: &'static encoding_rs::Encoding,
    source: &dyn ByteSource,
    options: &PipelineOptions,
) -> Result<TableOutcome> {
    let url = Url::parse(&table.url).with_context(|| format!("Parsing table URL {}", table.url))?;
    let path = source.fetch(&url)?;

    info!("Validating {} against its table schema", table.url);
    let mut accumulator = TableAccumulator::new(table);
    pass_one(table, validator, &path, encoding, options, &mut accumulator)?;

    let colliding: HashSet<u64> = accumulator
        .pk_buckets
        .values()
        .filter(|rows| rows.len() >= 2)
        .flatten()
        .copied()
        .collect();
    if !colliding.is_empty() {
        debug!(
            "{} row(s) share a primary key hash in {}; re-reading to compare keys",
            colliding.len(),
            table.url
        );
        let path = source.fetch(&url)?;
        let duplicates = pass_two(table, validator, &path, encoding, &colliding)?;
        accumulator.report.errors.extend(duplicates);
    }

    Ok(TableOutcome {
        report: accumulator.report,
        child_fk_values: accumulator.child_fk_values,
        parent_ref_values: accumulator.parent_ref_values,
    })
}

/// Streams every record through the worker pool, folding outcomes into the
/// accumulator as they arrive.
fn pass_one(
    table: &Table,
    validator: &RowValidator,
    path: &std::path::Path,
    encoding: &'static encoding_rs::Encoding,
    options: &PipelineOptions,
    accumulator: &mut TableAccumulator,
) -> Result<()> {
    let mut reader = io_utils::open_csv_reader_from_path(path, &table.dialect)?;
    let trim = table.dialect.trim;
    let expected = validator.expected_fields();

    let mut record = csv::ByteRecord::new();
    let mut record_number: u64 = 0;
    for _ in 0..table.dialect.skip_rows {
        if !reader.read_byte_record(&mut record)? {
            return Ok(());
        }
        record_number += 1;
    }

    if table.dialect.header {
        if !reader.read_byte_record(&mut record)? {
            return Ok(());
        }
        record_number += 1;
        let fields = io_utils::decode_record(&record, encoding, trim)?;
        if fields.len() > expected {
            accumulator.report.error(Issue::structure(
                "Malformed header",
                record_number,
                format!("expected {expected} column(s), found {}", fields.len()),
            ));
        } else if fields.len() < expected {
            accumulator.report.error(Issue::structure(
                "ragged_rows",
                record_number,
                format!("expected {expected} column(s), found {}", fields.len()),
            ));
        }
        let (warnings, errors) = validator.header_issues(record_number, &fields);
        accumulator.report.warnings.extend(warnings);
        accumulator.report.errors.extend(errors);
    }

    let row_grouping = options.row_grouping.max(1);
    let parallelism = options.parallelism.max(1);

    thread::scope(|scope| -> Result<()> {
        let (batch_tx, batch_rx) = mpsc::sync_channel::<Vec<WorkItem>>(parallelism);
        let batch_rx = Arc::new(Mutex::new(batch_rx));
        let (outcome_tx, outcome_rx) = mpsc::channel::<Vec<RowOutcome>>();

        for _ in 0..parallelism {
            let batch_rx = Arc::clone(&batch_rx);
            let outcome_tx = outcome_tx.clone();
            scope.spawn(move || worker_loop(&batch_rx, &outcome_tx, validator, expected));
        }

        let producer_tx = outcome_tx;
        let skip_blank = table.dialect.skip_blank_rows;
        let producer = scope.spawn(move || -> Result<()> {
            produce_batches(
                &mut reader,
                record_number,
                encoding,
                trim,
                skip_blank,
                row_grouping,
                &batch_tx,
                &producer_tx,
            )
        });

        for outcomes in outcome_rx {
            for outcome in outcomes {
                accumulator.fold(outcome);
            }
        }

        match producer.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("CSV producer thread panicked")),
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn produce_batches(
    reader: &mut csv::Reader<std::io::BufReader<std::fs::File>>,
    mut record_number: u64,
    encoding: &'static encoding_rs::Encoding,
    trim: crate::schema::Trim,
    skip_blank: bool,
    row_grouping: usize,
    batch_tx: &SyncSender<Vec<WorkItem>>,
    outcome_tx: &Sender<Vec<RowOutcome>>,
) -> Result<()> {
    let mut record = csv::ByteRecord::new();
    let mut batch = Vec::with_capacity(row_grouping);
    while reader.read_byte_record(&mut record)? {
        record_number += 1;
        let fields = io_utils::decode_record(&record, encoding, trim)?;
        if fields.iter().all(String::is_empty) {
            if skip_blank {
                continue;
            }
            let blank = RowOutcome {
                record_number,
                errors: vec![Issue::structure(
                    "Blank rows",
                    record_number,
                    "row contains no values",
                )],
                primary_key: None,
                child_keys: Vec::new(),
                parent_reference_keys: Vec::new(),
            };
            let _ = outcome_tx.send(vec![blank]);
            continue;
        }
        batch.push(WorkItem {
            record_number,
            fields,
        });
        if batch.len() == row_grouping {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(row_grouping));
            if batch_tx.send(full).is_err() {
                break;
            }
        }
    }
    if !batch.is_empty() {
        let _ = batch_tx.send(batch);
    }
    Ok(())
}

fn worker_loop(
    batch_rx: &Mutex<Receiver<Vec<WorkItem>>>,
    outcome_tx: &Sender<Vec<RowOutcome>>,
    validator: &RowValidator,
    expected: usize,
) {
    loop {
        let batch = {
            let Ok(guard) = batch_rx.lock() else { break };
            guard.recv()
        };
        let Ok(batch) = batch else { break };
        let outcomes = batch
            .into_iter()
            .map(|item| process_item(validator, expected, item))
            .collect();
        if outcome_tx.send(outcomes).is_err() {
            break;
        }
    }
}

fn process_item(validator: &RowValidator, expected: usize, item: WorkItem) -> RowOutcome {
    if item.fields.len() != expected {
        let detail = format!(
            "expected {expected} column(s), found {}",
            item.fields.len()
        );
        return RowOutcome {
            record_number: item.record_number,
            errors: vec![Issue::structure("ragged_rows", item.record_number, detail)],
            primary_key: None,
            child_keys: Vec::new(),
            parent_reference_keys: Vec::new(),
        };
    }
    validator.validate_row(item.record_number, &item.fields)
}

/// Re-reads only the rows whose primary-key hashes collided and reports a
/// `duplicate_key` for every later row whose actual key was already seen.
fn pass_two(
    table: &Table,
    validator: &RowValidator,
    path: &std::path::Path,
    encoding: &'static encoding_rs::Encoding,
    colliding: &HashSet<u64>,
) -> Result<Vec<Issue>> {
    let mut reader = io_utils::open_csv_reader_from_path(path, &table.dialect)?;
    let trim = table.dialect.trim;
    let mut record = csv::ByteRecord::new();
    let mut record_number: u64 = 0;
    let header_records = table.dialect.skip_rows + u64::from(table.dialect.header);
    for _ in 0..header_records {
        if !reader.read_byte_record(&mut record)? {
            return Ok(Vec::new());
        }
        record_number += 1;
    }

    let mut seen: HashSet<KeyValue> = HashSet::with_capacity(colliding.len());
    let mut duplicates = Vec::new();
    let mut remaining = colliding.len();
    while remaining > 0 && reader.read_byte_record(&mut record)? {
        record_number += 1;
        if !colliding.contains(&record_number) {
            continue;
        }
        remaining -= 1;
        let fields = io_utils::decode_record(&record, encoding, trim)?;
        let Some(key) = validator.primary_key_of(&fields) else {
            continue;
        };
        if !seen.insert(key.clone()) {
            duplicates.push(
                Issue::new(
                    "duplicate_key",
                    crate::report::CATEGORY_SCHEMA,
                    format!("key already present - {}", key.display_joined()),
                )
                .with_row(record_number),
            );
        }
    }
    Ok(duplicates)
}
