//! I/O utilities: CSV ingestion, encoding, and delimiter resolution.
//!
//! All file I/O flows through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` ->
//!   comma, `.tsv` -> tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`/`encoding_rs_io` with
//!   BOM sniffing, defaulting to UTF-8. RCM exports are frequently
//!   Shift_JIS, so the label lookup accepts anything `encoding_rs` knows.
//! - **Ingestion**: [`read_raw_dataset()`] turns a delimited file into
//!   `(RawDataset, ordered header list)`, assigning positional placeholder
//!   names to unnamed columns.
//! - **stdin/stdout**: the `-` path convention routes through standard
//!   streams.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::{
    data::{RawDataset, RawRow, Scalar},
    error::RcmError,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

fn open_decoded_reader(path: &Path, encoding: &'static Encoding) -> Result<Box<dyn Read>> {
    let raw: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(Box::new(
        DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding))
            .bom_sniffing(true)
            .build(raw),
    ))
}

/// Header names as they will key row values: original spellings preserved,
/// blank cells replaced by positional placeholders.
pub fn placeholder_headers(raw: &[String]) -> Vec<String> {
    raw.iter()
        .enumerate()
        .map(|(idx, name)| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

/// Read a delimited file into row-record form. Returns the rows in original
/// file order together with the ordered header list.
pub fn read_raw_dataset(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<(RawDataset, Vec<String>), RcmError> {
    let decoded = open_decoded_reader(path, encoding)
        .map_err(|err| RcmError::FileParse(format!("{err:#}")))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(decoded);

    let header_record = reader
        .headers()
        .map_err(|err| RcmError::FileParse(format!("reading header row: {err}")))?
        .clone();
    let headers = placeholder_headers(
        &header_record
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>(),
    );

    let mut rows: RawDataset = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            RcmError::FileParse(format!("reading row {}: {err}", row_number + 1))
        })?;
        let mut row = RawRow::new();
        for (idx, header) in headers.iter().enumerate() {
            let field = record.get(idx).unwrap_or("");
            row.insert(header.clone(), Scalar::from_csv_field(field));
        }
        rows.push(row);
    }
    Ok((rows, headers))
}
