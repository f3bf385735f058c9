//! Column type inference and value casting

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ckanny_api::FieldType;
use serde_json::{Number, Value};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const TIMESTAMP_OUTPUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Pick the narrowest type that fits every non-empty value of a column.
/// Columns with no values are `text`.
pub fn infer_type<'a, I>(values: I) -> FieldType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut int = true;
    let mut numeric = true;
    let mut boolean = true;
    let mut timestamp = true;

    for value in values.into_iter().map(str::trim).filter(|v| !v.is_empty()) {
        seen = true;
        int = int && value.parse::<i64>().is_ok();
        numeric = numeric && parse_number(value).is_some();
        boolean = boolean && parse_bool(value).is_some();
        timestamp = timestamp && parse_timestamp(value).is_some();

        if !(int || numeric || boolean || timestamp) {
            return FieldType::Text;
        }
    }

    if !seen {
        FieldType::Text
    } else if int {
        FieldType::Int
    } else if numeric {
        FieldType::Numeric
    } else if boolean {
        FieldType::Bool
    } else if timestamp {
        FieldType::Timestamp
    } else {
        FieldType::Text
    }
}

/// Convert a raw cell into the JSON value for `field_type`.
///
/// Empty cells become `null`. A value that does not fit the type is kept
/// as a string and left for the datastore to reject.
pub fn cast(value: &str, field_type: FieldType) -> Value {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    let cast = match field_type {
        FieldType::Text => None,
        FieldType::Int => trimmed.parse::<i64>().ok().map(Value::from),
        FieldType::Numeric => parse_number(trimmed)
            .and_then(Number::from_f64)
            .map(Value::Number),
        FieldType::Bool => parse_bool(trimmed).map(Value::Bool),
        FieldType::Timestamp => {
            parse_timestamp(trimmed).map(|ts| Value::String(ts.format(TIMESTAMP_OUTPUT).to_string()))
        }
    };

    cast.unwrap_or_else(|| Value::String(value.to_string()))
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
