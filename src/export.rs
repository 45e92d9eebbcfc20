//! Standardized CSV export.
//!
//! Output is fixed-shape: one header row with the standard column labels in
//! registry order, one row per standardized row, every field quoted with
//! internal quotes doubled, UTF-8 with a byte-order-mark prefix so
//! spreadsheet applications pick the encoding up correctly.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::QuoteStyle;

use crate::{
    data::StandardizedRow,
    io_utils,
    schema::StandardColumn,
};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write standardized rows as CSV to `path`, or to stdout when `path` is
/// `None` or `-`.
pub fn write_standardized(path: Option<&Path>, rows: &[StandardizedRow]) -> Result<()> {
    let mut base: Box<dyn Write> = match path {
        Some(p) if !io_utils::is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    base.write_all(UTF8_BOM).context("Writing BOM prefix")?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .from_writer(base);

    writer
        .write_record(StandardColumn::labels())
        .context("Writing header row")?;
    for row in rows {
        writer.write_record(row.values()).context("Writing row")?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

/// Header labels plus stringified rows, for the elastic table preview.
pub fn table_rows(rows: &[StandardizedRow]) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = StandardColumn::labels();
    let body = rows.iter().map(StandardizedRow::values).collect();
    (headers, body)
}
