//! Structural transforms over JSON-like values: flatten/unflatten, type
//! coercion of string leaves and shallow map merging.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::TransformError;

/// Default path delimiter for [`inflate`] and [`deflate`].
pub const DEFAULT_DELIMITER: &str = ".";

static RE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+]?\d+$").unwrap());
static RE_FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?(\d+\.\d*|\.\d+|\d+)([eE][-+]?\d+)?$").unwrap());

/// Parser used by [`typify`] for strings holding an embedded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypifyParser {
    #[default]
    Json,
    Yaml,
}

impl std::str::FromStr for TypifyParser {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(TypifyParser::Json),
            "yaml" => Ok(TypifyParser::Yaml),
            other => Err(TransformError::InvalidParser(other.to_string())),
        }
    }
}

enum Splitter {
    Literal(String),
    Pattern(Regex),
}

impl Splitter {
    /// A single-character delimiter is taken literally, anything longer is a
    /// regular expression (`/+` collapses repeated slashes).
    fn new(delimiter: &str) -> Result<Self, TransformError> {
        if delimiter.chars().count() <= 1 {
            return Ok(Splitter::Literal(delimiter.to_string()));
        }
        Regex::new(delimiter)
            .map(Splitter::Pattern)
            .map_err(|e| TransformError::InvalidPattern {
                pattern: delimiter.to_string(),
                reason: e.to_string(),
            })
    }

    fn split<'a>(&self, key: &'a str) -> Vec<&'a str> {
        match self {
            Splitter::Literal(d) if d.is_empty() => vec![key],
            Splitter::Literal(d) => key.split(d.as_str()).collect(),
            Splitter::Pattern(re) => re.split(key).collect(),
        }
    }
}

/// Expands a flat map whose keys encode a path into the equivalent nested map.
pub fn inflate(flat: &Map<String, Value>, delimiter: &str) -> Result<Map<String, Value>, TransformError> {
    let splitter = Splitter::new(delimiter)?;
    let mut result = Map::new();

    for (key, value) in flat {
        let parts = splitter.split(key);
        let Some((leaf, parents)) = parts.split_last() else {
            continue;
        };

        insert_path(&mut result, parents, leaf, value.clone());
    }

    Ok(result)
}

/// Inserts `value` under `leaf` below the `parents` path, replacing any
/// non-map value found on the way.
fn insert_path(node: &mut Map<String, Value>, parents: &[&str], leaf: &str, value: Value) {
    let Some((head, rest)) = parents.split_first() else {
        node.insert(leaf.to_string(), value);
        return;
    };
    let entry = node
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(child) = entry {
        insert_path(child, rest, leaf, value);
    } else {
        let mut child = Map::new();
        insert_path(&mut child, rest, leaf, value);
        *entry = Value::Object(child);
    }
}

/// Flattens a nested map into path keys joined by `delimiter`.
///
/// The delimiter is a literal joiner of any length. Unlike [`inflate`],
/// a multi-character delimiter is not treated as a pattern.
///
/// List leaves are written as their compact JSON text (`[1,2,3]`); scalar
/// leaves keep their type.
pub fn deflate(nested: &Map<String, Value>, delimiter: &str) -> Result<Map<String, Value>, TransformError> {
    let mut result = Map::new();
    deflate_into(nested, delimiter, None, &mut result)?;
    Ok(result)
}

fn deflate_into(
    nested: &Map<String, Value>,
    delimiter: &str,
    prefix: Option<&str>,
    out: &mut Map<String, Value>,
) -> Result<(), TransformError> {
    for (key, value) in nested {
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, delimiter, key),
            None => key.clone(),
        };
        match value {
            Value::Object(child) => deflate_into(child, delimiter, Some(&path), out)?,
            Value::Array(_) => {
                let text = serde_json::to_string(value)
                    .map_err(|e| TransformError::Serialize(e.to_string()))?;
                out.insert(path, Value::String(text));
            }
            scalar => {
                out.insert(path, scalar.clone());
            }
        }
    }
    Ok(())
}

/// Recursively converts string leaves to the type they spell out: boolean,
/// integer, float, or an embedded document parsed with `parser`.
///
/// Strings that are none of these are left unchanged.
pub fn typify(value: &Value, parser: TypifyParser) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), typify(v, parser)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| typify(v, parser)).collect()),
        Value::String(s) => typify_str(s, parser).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn typify_str(s: &str, parser: TypifyParser) -> Option<Value> {
    match s {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }

    if RE_INTEGER.is_match(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Some(Value::from(i));
        }
    }

    if RE_FLOAT.is_match(s) {
        if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Some(Value::Number(n));
        }
    }

    let embedded = match parser {
        TypifyParser::Json => serde_json::from_str::<Value>(s).ok(),
        TypifyParser::Yaml => serde_yaml::from_str::<Value>(s).ok(),
    }?;

    match embedded {
        Value::Object(_) | Value::Array(_) => Some(typify(&embedded, parser)),
        _ => None,
    }
}

/// Shallow, right-biased merge of two maps. A missing right-hand side
/// returns the left unchanged.
pub fn merge(left: &Map<String, Value>, right: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut merged = left.clone();
    if let Some(right) = right {
        for (key, value) in right {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
