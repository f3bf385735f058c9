//! Tabular parsing
//!
//! Turns a buffered CSV or Excel file into a datastore schema plus rows.
//! The header row names the fields; sanitizing names and inferring column
//! types are both opt-in.

mod format;
mod infer;
mod reader;

pub use format::{TabularFormat, extension_of};
pub use infer::{cast, infer_type};
pub use reader::{read_rows, resolve_encoding};

use std::collections::HashSet;
use std::io::{Read, Seek};
use std::sync::LazyLock;

use ckanny_api::{Field, FieldType, Record};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::Result;

/// Runs of anything other than letters and digits
static SEPARATOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{N}]+").expect("Invalid separator regex"));

/// How to read a tabular file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// WHATWG encoding label for CSV input; UTF-8 when unset
    pub encoding: Option<String>,
    /// Normalize field names with [`sanitize_name`]
    pub sanitize: bool,
    /// Infer column types and cast values
    pub type_cast: bool,
    /// Rows to skip before the header row
    pub first_row: usize,
    /// Leading columns to drop from every row
    pub first_col: usize,
}

/// A parsed file: field definitions and rows keyed by field id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    pub fields: Vec<Field>,
    pub records: Vec<Record>,
}

impl ParsedTable {
    pub fn field_ids(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Parse `reader` as `format`.
///
/// A file without rows after the header gives a table with no records;
/// a file without even a header gives no fields either.
pub fn parse<R: Read + Seek>(
    reader: R,
    format: TabularFormat,
    options: &ParseOptions,
) -> Result<ParsedTable> {
    let rows = read_rows(reader, format, options.encoding.as_deref())?;
    let mut rows = rows
        .into_iter()
        .skip(options.first_row)
        .map(|row| row.into_iter().skip(options.first_col).collect::<Vec<_>>());

    let Some(header) = rows.next() else {
        debug!(%format, "File has no header row");
        return Ok(ParsedTable::default());
    };

    let names = field_names(&header, options.sanitize);
    let width = names.len();
    let rows: Vec<Vec<String>> = rows
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    let types: Vec<FieldType> = if options.type_cast {
        (0..width)
            .map(|col| infer_type(rows.iter().map(|row| row[col].as_str())))
            .collect()
    } else {
        vec![FieldType::Text; width]
    };

    let records = rows
        .into_iter()
        .map(|row| {
            names
                .iter()
                .zip(&types)
                .zip(row)
                .map(|((name, field_type), value)| {
                    let value = if options.type_cast {
                        cast(&value, *field_type)
                    } else {
                        Value::String(value)
                    };
                    (name.clone(), value)
                })
                .collect::<Record>()
        })
        .collect::<Vec<_>>();

    let fields = names
        .into_iter()
        .zip(types)
        .map(|(name, field_type)| Field::new(name, field_type))
        .collect();

    debug!(%format, rows = records.len(), "Parsed table");
    Ok(ParsedTable { fields, records })
}

/// Normalize a header into a field id: lowercase, every run of characters
/// other than letters and digits becomes one `_`, no leading or trailing `_`.
pub fn sanitize_name(name: &str) -> String {
    SEPARATOR_REGEX
        .replace_all(name, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Field ids from a header row. Blank headers become `field_<n>` and
/// repeats get a numeric suffix, since the datastore needs unique ids.
fn field_names(header: &[String], sanitize: bool) -> Vec<String> {
    let mut seen = HashSet::new();

    header
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let name = if sanitize {
                sanitize_name(raw)
            } else {
                raw.trim().to_string()
            };
            let name = if name.is_empty() {
                format!("field_{}", index + 1)
            } else {
                name
            };

            let mut unique = name.clone();
            let mut suffix = 2;
            while !seen.insert(unique.clone()) {
                unique = format!("{}_{}", name, suffix);
                suffix += 1;
            }
            unique
        })
        .collect()
}
