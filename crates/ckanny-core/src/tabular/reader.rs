//! Raw row readers for CSV and Excel workbooks
//!
//! Both readers return every row as strings; header handling and casting
//! happen in the parent module.

use std::fmt::Display;
use std::io::{Read, Seek};

use calamine::{Data, DataType, Range, Reader, Xls, Xlsx};
use encoding_rs::Encoding;
use tracing::{debug, warn};

use super::TabularFormat;
use crate::{Error, Result};

/// Read all rows of `reader` as `format`.
pub fn read_rows<R: Read + Seek>(
    reader: R,
    format: TabularFormat,
    encoding: Option<&str>,
) -> Result<Vec<Vec<String>>> {
    match format {
        TabularFormat::Csv => read_csv(reader, encoding),
        TabularFormat::Xls => {
            let workbook = Xls::new(reader).map_err(|e| parse_error(format, e))?;
            read_first_sheet(workbook, format)
        }
        TabularFormat::Xlsx => {
            let workbook = Xlsx::new(reader).map_err(|e| parse_error(format, e))?;
            read_first_sheet(workbook, format)
        }
    }
}

fn read_csv<R: Read>(mut reader: R, encoding: Option<&str>) -> Result<Vec<Vec<String>>> {
    let encoding = resolve_encoding(encoding)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    // A byte order mark overrides the declared encoding
    let (text, used, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            encoding = used.name(),
            "Input contained malformed sequences; replaced them"
        );
    }
    debug!(encoding = used.name(), bytes = bytes.len(), "Decoded CSV");

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| parse_error(TabularFormat::Csv, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Look up an encoding by its WHATWG label, defaulting to UTF-8.
pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        None => Ok(encoding_rs::UTF_8),
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| Error::invalid_option(format!("unknown encoding `{}`", label))),
    }
}

fn read_first_sheet<R, W>(mut workbook: W, format: TabularFormat) -> Result<Vec<Vec<String>>>
where
    R: Read + Seek,
    W: Reader<R>,
    W::Error: Display,
{
    let range: Range<Data> = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| parse_error(format, e))?,
        None => {
            debug!(%format, "Workbook has no worksheets");
            return Ok(Vec::new());
        }
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

fn parse_error(format: TabularFormat, error: impl Display) -> Error {
    Error::Parse {
        format: format.to_string(),
        message: error.to_string(),
    }
}
