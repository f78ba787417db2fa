// src/storage/line_protocol.rs
// InfluxDB line protocol encoding
use crate::domain::point::{FieldValue, Point};
use std::fmt::Write;

/// Encode a point as one line of InfluxDB line protocol.
///
/// Tags with empty values and null or non-finite fields are left out, since
/// the server rejects them. Returns `None` when no field survives or the
/// timestamp does not fit in nanoseconds.
pub fn encode_point(point: &Point) -> Option<String> {
    let timestamp = point.timestamp().timestamp_nanos_opt()?;

    let mut line = escape(point.measurement(), &[',', ' ']);

    // BTreeMap iteration keeps tags sorted by key
    for (key, value) in point.tags() {
        if value.is_empty() {
            continue;
        }
        let _ = write!(
            line,
            ",{}={}",
            escape(key, &[',', '=', ' ']),
            escape(value, &[',', '=', ' '])
        );
    }

    let mut fields = Vec::with_capacity(point.fields().len());
    for (key, value) in point.fields() {
        if let Some(encoded) = encode_field(value) {
            fields.push(format!("{}={}", escape(key, &[',', '=', ' ']), encoded));
        }
    }
    if fields.is_empty() {
        return None;
    }

    let _ = write!(line, " {} {}", fields.join(","), timestamp);
    Some(line)
}

fn encode_field(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(v) if v.is_finite() => Some(format!("{}", v)),
        FieldValue::Float(_) => None,
        FieldValue::Integer(v) => Some(format!("{}i", v)),
        FieldValue::Boolean(v) => Some(v.to_string()),
        FieldValue::String(v) => Some(quote(v)),
        FieldValue::List(items) => serde_json::to_string(items).ok().map(|json| quote(&json)),
        FieldValue::Null => None,
    }
}

// Quoted string fields may hold raw newlines; only the quote and backslash are escaped
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Measurement names, tag keys and values, and field keys
fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            c if special.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
