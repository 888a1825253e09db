//! Validation orchestration: metadata intake, per-table pipelines, and the
//! cross-table integrity pass, stitched into one report.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use url::Url;

use crate::{
    cli::{ReportFormat, ValidateArgs},
    fetch::{ByteSource, DefaultByteSource, url_from_arg},
    integrity, metadata,
    report::{Issue, WarningsAndErrors},
    table::{PipelineOptions, run_table},
    table_print,
};

/// Runs a full validation and renders the report. Returns an error when any
/// validation error was found, so the process exits non-zero; warnings alone
/// leave the exit code untouched.
pub fn execute(args: &ValidateArgs) -> Result<()> {
    let options = PipelineOptions {
        row_grouping: args.row_grouping,
        parallelism: args
            .parallelism
            .unwrap_or_else(|| PipelineOptions::default().parallelism),
    };
    let source = DefaultByteSource;
    let report = validate_source(&args.schema, args.csv.as_deref(), &source, &options)?;

    match args.report {
        ReportFormat::Table => {
            table_print::print_issues("Warnings", &report.warnings);
            table_print::print_issues("Errors", &report.errors);
        }
        ReportFormat::Json => {
            let rendered =
                serde_json::to_string_pretty(&report).context("Serialising the report")?;
            println!("{rendered}");
        }
    }

    info!(
        "Validation finished with {} warning(s) and {} error(s)",
        report.warnings.len(),
        report.errors.len()
    );
    if report.has_errors() {
        bail!("Validation found {} error(s)", report.errors.len());
    }
    Ok(())
}

/// Validates the metadata document at `schema_arg` (a path or URL) and every
/// table it declares. `csv_override` redirects the first table at a specific
/// CSV file, flagging a `source_url_mismatch` warning when the URLs differ.
pub fn validate_source(
    schema_arg: &str,
    csv_override: Option<&str>,
    source: &dyn ByteSource,
    options: &PipelineOptions,
) -> Result<WarningsAndErrors> {
    let metadata_url = url_from_arg(schema_arg)?;
    let document = load_metadata(&metadata_url, source)?;

    let intake = metadata::table_group_from_json(&document, &metadata_url)
        .with_context(|| format!("Reading CSV-W metadata from {metadata_url}"))?;
    let mut group = intake.group;
    let mut report = intake.issues;

    if let Some(csv_arg) = csv_override {
        let csv_url = url_from_arg(csv_arg)?;
        let table = group
            .tables
            .first_mut()
            .ok_or_else(|| anyhow!("Metadata declares no usable tables"))?;
        if table.url != csv_url.as_str() {
            report.warn(
                Issue::new(
                    "source_url_mismatch",
                    crate::report::CATEGORY_STRUCTURE,
                    format!("'{}' does not match the declared url '{}'", csv_url, table.url),
                )
                .with_csv_path(csv_url.as_str()),
            );
            table.url = csv_url.to_string();
        }
    }

    info!("Validating {} table(s)", group.tables.len());
    let outcomes: Vec<_> = group
        .tables
        .iter()
        .map(|table| run_table(table, source, options))
        .collect();
    for outcome in &outcomes {
        report.warnings.extend(outcome.report.warnings.iter().cloned());
        report.errors.extend(outcome.report.errors.iter().cloned());
    }

    debug!("Resolving foreign key references across tables");
    report.absorb(integrity::check_foreign_keys(&group, &outcomes));
    Ok(report)
}

fn load_metadata(url: &Url, source: &dyn ByteSource) -> Result<serde_json::Value> {
    let path = source
        .fetch(url)
        .with_context(|| format!("Fetching metadata document {url}"))?;
    let file = std::fs::File::open(&path)
        .with_context(|| format!("Opening metadata document {path:?}"))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Parsing metadata document {url}"))
}
