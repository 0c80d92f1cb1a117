//! Value escaper — renders raw JSON values as ClickHouse literals according
//! to the semantic type of the column they are compared against.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

use crate::schema::FieldType;

/// A rendered, already-escaped SQL literal (or bracketed literal list).
///
/// Only the functions in this module construct one, so any `SqlLiteral` that
/// reaches the renderer went through quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlLiteral(String);

impl SqlLiteral {
    pub fn null() -> Self {
        Self("NULL".to_string())
    }

    pub fn string(raw: &str) -> Self {
        Self(format!("'{}'", double_quotes(raw)))
    }

    /// `LIKE` pattern with optional leading/trailing `%` wildcards.
    pub fn pattern(needle: &str, leading: bool, trailing: bool) -> Self {
        Self(format!(
            "'{}{}{}'",
            if leading { "%" } else { "" },
            double_quotes(needle),
            if trailing { "%" } else { "" },
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Doubles every `'`. Backslashes are left alone.
pub fn double_quotes(raw: &str) -> Cow<'_, str> {
    if raw.contains('\'') {
        Cow::Owned(raw.replace('\'', "''"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Backtick-quoted identifier with embedded backticks doubled.
pub fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Plain text of a JSON value: strings unwrapped, everything else in its
/// JSON form.
pub fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Escape `value` for a column of type `ty`.
pub fn escape_value(value: &Value, ty: FieldType) -> SqlLiteral {
    if value.is_null() {
        return SqlLiteral::null();
    }
    if ty.is_array() {
        return escape_array(value);
    }
    if ty.is_quoted() {
        return SqlLiteral::string(&value_text(value));
    }
    escape_number(value)
}

/// Bracketed list of string literals; a scalar becomes a one-element list.
pub fn escape_array(value: &Value) -> SqlLiteral {
    let items: Vec<String> = match value {
        Value::Null => return SqlLiteral::null(),
        Value::Array(items) => items
            .iter()
            .map(|v| escape_value(v, FieldType::String).0)
            .collect(),
        scalar => vec![escape_value(scalar, FieldType::String).0],
    };
    SqlLiteral(format!("[{}]", items.join(", ")))
}

/// Numeric and boolean-as-integer columns render unquoted. Anything that is
/// not a number falls back to a quoted string so the output stays one literal.
fn escape_number(value: &Value) -> SqlLiteral {
    match value {
        Value::Number(n) => SqlLiteral(n.to_string()),
        Value::Bool(b) => SqlLiteral(if *b { "1" } else { "0" }.to_string()),
        Value::String(s) if is_numeric_text(s) => SqlLiteral(s.trim().to_string()),
        other => SqlLiteral::string(&value_text(other)),
    }
}

fn is_numeric_text(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && (s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok_and(|f| f.is_finite()))
}
