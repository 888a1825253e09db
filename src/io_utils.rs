//! CSV reader construction and record decoding.
//!
//! Readers are always built headerless so the pipeline sees every physical
//! record and owns the numbering; header interpretation is dialect-driven and
//! happens upstream. Decoding flows through `encoding_rs`, defaulting to
//! UTF-8.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::schema::{Dialect, Trim};

pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Ok(UTF_8);
    }
    Encoding::for_label(trimmed.as_bytes()).ok_or_else(|| anyhow!("Unknown encoding '{label}'"))
}

pub fn open_csv_reader_from_path(
    path: &Path,
    dialect: &Dialect,
) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Opening CSV file {path:?}"))?;
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(dialect.delimiter)
        .double_quote(dialect.double_quote);
    if dialect.quote_char == 0 {
        builder.quoting(false);
    } else {
        builder.quote(dialect.quote_char);
    }
    if !dialect.double_quote {
        builder.escape(Some(b'\\'));
    }
    Ok(builder.from_reader(BufReader::new(file)))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Decodes a record's fields and applies the dialect's field trimming.
pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
    trim: Trim,
) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            let decoded = decode_bytes(field, encoding)?;
            Ok(trim.apply(&decoded).to_string())
        })
        .collect()
}
