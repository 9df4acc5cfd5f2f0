//! Numeric normalization of query results.
//!
//! The backend serializes measure and dimension values as strings even when
//! the column is declared numeric. [`cast_numerics`] rewrites those cells in
//! place using the column annotations that accompany every result.

use std::collections::BTreeSet;

use serde_json::{Number, Value};

// 2^63 and 2^64: the first integral f64 values outside i64 and u64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Names of columns declared with `type == "number"`.
///
/// Scans both `annotation.dimensions` and `annotation.measures`; one numeric
/// declaration is enough.
pub fn numeric_columns(response: &Value) -> BTreeSet<String> {
    let Some(annotation) = response.get("annotation") else {
        return BTreeSet::new();
    };

    ["dimensions", "measures"]
        .iter()
        .filter_map(|section| annotation.get(*section).and_then(Value::as_object))
        .flat_map(|columns| columns.iter())
        .filter(|(_, column)| column.get("type").and_then(Value::as_str) == Some("number"))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Coerce numeric-annotated cells to JSON numbers, in place.
///
/// Does nothing unless both `data` and `annotation` are present and
/// non-empty. Integral values become integers (exactly, when the cell is
/// integer text), others stay floats.
/// Values that do not parse are left untouched, and rows missing a column
/// are skipped for it. Returns the number of cells rewritten.
pub fn cast_numerics(response: &mut Value) -> usize {
    let has_data = response.get("data").is_some_and(is_truthy);
    let has_annotation = response.get("annotation").is_some_and(is_truthy);
    if !has_data || !has_annotation {
        return 0;
    }

    let columns = numeric_columns(response);
    if columns.is_empty() {
        return 0;
    }

    let Some(rows) = response.get_mut("data").and_then(Value::as_array_mut) else {
        return 0;
    };

    let mut converted = 0;
    for row in rows.iter_mut().filter_map(Value::as_object_mut) {
        for column in &columns {
            if let Some(cell) = row.get_mut(column) {
                if let Some(number) = coerce(cell) {
                    *cell = number;
                    converted += 1;
                }
            }
        }
    }
    converted
}

/// Parse one cell. Returns None when the cell should stay as it is.
fn coerce(cell: &Value) -> Option<Value> {
    let parsed = match cell {
        Value::String(text) => {
            let text = text.trim();
            // Integer text converts exactly, without a detour through f64
            if let Ok(n) = text.parse::<i64>() {
                return Some(Value::from(n));
            }
            if let Ok(n) = text.parse::<u64>() {
                return Some(Value::from(n));
            }
            text.parse::<f64>().ok()?
        }
        // Exact integers are already in their final form
        Value::Number(n) if n.is_i64() || n.is_u64() => return None,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };

    if !parsed.is_finite() {
        return None;
    }

    if parsed.fract() == 0.0 {
        if (-I64_BOUND..I64_BOUND).contains(&parsed) {
            return Some(Value::from(parsed as i64));
        }
        if (0.0..U64_BOUND).contains(&parsed) {
            return Some(Value::from(parsed as u64));
        }
    }

    Number::from_f64(parsed).map(Value::Number)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
