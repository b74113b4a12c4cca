//! Requirements DSL (spec §4.1): a small prefix-expression language for
//! host capability constraints, translated to `"<ident> <op> <literal>"`
//! filter strings.

use crate::error::{Error, Result};
use serde_json::Value;

const OPERATORS: &[&str] = &["==", "=", "!=", ">=", "<=", ">", "<"];

/// Anything that can stand for a requirements expression: a raw JSON
/// string, or an already-parsed `serde_json::Value`.
pub enum Requirements {
    Text(String),
    Parsed(Value),
}

impl From<&str> for Requirements {
    fn from(s: &str) -> Self {
        Requirements::Text(s.to_string())
    }
}

impl From<String> for Requirements {
    fn from(s: String) -> Self {
        Requirements::Text(s)
    }
}

impl From<Value> for Requirements {
    fn from(v: Value) -> Self {
        Requirements::Parsed(v)
    }
}

/// Translate a requirements expression into its filter strings.
///
/// Grammar (spec §4.1):
/// ```text
/// expr := atom | conj
/// atom := [ op, "$ident", literal ]
/// conj := [ "and", expr, expr, ... ]
/// ```
pub fn translate(requirements: impl Into<Requirements>) -> Result<Vec<String>> {
    let value = match requirements.into() {
        Requirements::Text(s) => {
            serde_json::from_str(&s).map_err(|_| malformed_str(&s))?
        }
        Requirements::Parsed(v) => v,
    };
    convert(&value)
}

fn malformed(value: &Value) -> Error {
    Error::MalformedRequirements { rqrms: value.to_string() }
}

fn malformed_str(s: &str) -> Error {
    Error::MalformedRequirements { rqrms: s.to_string() }
}

fn convert(requirements: &Value) -> Result<Vec<String>> {
    match requirements {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(vec![]);
            }
            if is_atom(items) {
                return Ok(vec![translate_atom(items)?]);
            }
            if is_conj(items) {
                let mut out = Vec::with_capacity(items.len() - 1);
                for item in &items[1..] {
                    out.extend(convert(item)?);
                }
                return Ok(out);
            }
            Err(malformed(requirements))
        }
        _ => Err(malformed(requirements)),
    }
}

fn as_str(v: &Value) -> Option<&str> {
    v.as_str()
}

fn is_atom(items: &[Value]) -> bool {
    items.len() == 3
        && items.iter().all(|i| i.is_string())
        && as_str(&items[0]).map(|op| OPERATORS.contains(&op)).unwrap_or(false)
        && as_str(&items[1]).map(|id| id.len() >= 2 && id.starts_with('$')).unwrap_or(false)
        && as_str(&items[2]).map(|lit| !lit.is_empty()).unwrap_or(false)
}

fn is_conj(items: &[Value]) -> bool {
    items.len() > 1 && as_str(&items[0]) == Some("and")
}

fn translate_atom(items: &[Value]) -> Result<String> {
    let op = as_str(&items[0]).ok_or_else(|| malformed_str("atom operator must be a string"))?;
    let ident = as_str(&items[1]).ok_or_else(|| malformed_str("atom identifier must be a string"))?;
    let literal = as_str(&items[2]).ok_or_else(|| malformed_str("atom literal must be a string"))?;
    let op = if op == "=" { "==" } else { op };
    Ok(format!("{} {} {}", &ident[1..], op, literal))
}
