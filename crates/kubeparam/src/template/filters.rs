//! Template environment and the filters it registers.
//!
//! Filters are thin adapters over [`crate::transform`]: they check the piped
//! value's type and convert between template values and JSON data.

use std::borrow::Cow;

use minijinja::value::{Kwargs, Value};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior};
use serde_json::Map;

use super::publish::{publish_locals, PUBLISH_FUNCTION};
use crate::error::TransformError;
use crate::transform::{self, naming, TypifyParser, DEFAULT_DELIMITER};

/// Builds an environment with strict undefined handling, no auto-escaping,
/// `none` printed as an empty string, every extension filter and the
/// assignment publishing hook.
pub(crate) fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_debug(false);
    env.set_formatter(|out, state, value| {
        if value.is_none() {
            Ok(())
        } else {
            minijinja::escape_formatter(out, state, value)
        }
    });

    env.add_function(PUBLISH_FUNCTION, publish_locals);

    env.add_filter("dns_safe", dns_safe);
    env.add_filter("env_safe", env_safe);
    env.add_filter("key_safe", key_safe);
    env.add_filter("indent", indent);
    env.add_filter("nindent", nindent);
    env.add_filter("stringify", stringify);
    env.add_filter("parse_yaml", parse_yaml);
    env.add_filter("to_yaml", to_yaml);
    env.add_filter("parse_json", parse_json);
    env.add_filter("to_json", to_json);
    env.add_filter("sha256", sha256);
    env.add_filter("encode64", encode64);
    env.add_filter("decode64", decode64);
    env.add_filter("merge", merge);
    env.add_filter("re_replace", re_replace);
    env.add_filter("re_contains", re_contains);
    env.add_filter("inflate", inflate);
    env.add_filter("deflate", deflate);
    env.add_filter("typify", typify);
    env
}

fn failed(err: TransformError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn mismatch(function: &'static str, expected: &'static str, value: &Value) -> Error {
    failed(TransformError::TypeMismatch {
        function,
        expected,
        found: value.kind().to_string(),
    })
}

fn text_arg<'a>(function: &'static str, value: &'a Value) -> Result<&'a str, Error> {
    value
        .as_str()
        .ok_or_else(|| mismatch(function, "a string", value))
}

fn to_data(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::new(ErrorKind::BadSerialization, e.to_string()))
}

fn map_arg(function: &'static str, value: &Value) -> Result<Map<String, serde_json::Value>, Error> {
    match to_data(value)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(mismatch(function, "a map", value)),
    }
}

fn from_map(map: Map<String, serde_json::Value>) -> Value {
    Value::from_serialize(serde_json::Value::Object(map))
}

/// Applies `sanitize`, handing back the piped value itself when nothing
/// changed.
fn sanitized(
    function: &'static str,
    value: Value,
    sanitize: fn(&str) -> Cow<'_, str>,
) -> Result<Value, Error> {
    let text = text_arg(function, &value)?;
    match sanitize(text) {
        Cow::Borrowed(_) => Ok(value.clone()),
        Cow::Owned(cleaned) => Ok(Value::from(cleaned)),
    }
}

fn dns_safe(value: Value) -> Result<Value, Error> {
    sanitized("dns_safe", value, naming::dns_safe)
}

fn env_safe(value: Value) -> Result<Value, Error> {
    sanitized("env_safe", value, naming::env_safe)
}

fn key_safe(value: Value) -> Result<Value, Error> {
    sanitized("key_safe", value, naming::key_safe)
}

fn indent(value: Value, count: usize) -> Result<String, Error> {
    Ok(transform::indent(text_arg("indent", &value)?, count))
}

fn nindent(value: Value, count: usize) -> Result<String, Error> {
    Ok(transform::nindent(text_arg("nindent", &value)?, count))
}

fn stringify(value: Value) -> Result<String, Error> {
    transform::stringify(&to_data(&value)?).map_err(failed)
}

fn parse_yaml(value: Value) -> Result<Value, Error> {
    let parsed = transform::parse_yaml(text_arg("parse_yaml", &value)?).map_err(failed)?;
    Ok(Value::from_serialize(parsed))
}

fn to_yaml(value: Value, kwargs: Kwargs) -> Result<String, Error> {
    let no_header = kwargs.get::<Option<bool>>("no_header")?.unwrap_or(false);
    kwargs.assert_all_used()?;
    transform::to_yaml(&to_data(&value)?, no_header).map_err(failed)
}

fn parse_json(value: Value) -> Result<Value, Error> {
    let parsed = transform::parse_json(text_arg("parse_json", &value)?).map_err(failed)?;
    Ok(Value::from_serialize(parsed))
}

fn to_json(value: Value) -> Result<String, Error> {
    transform::to_json(&to_data(&value)?).map_err(failed)
}

fn sha256(value: Value) -> Result<String, Error> {
    Ok(transform::sha256(text_arg("sha256", &value)?))
}

fn encode64(value: Value) -> Result<String, Error> {
    Ok(transform::encode64(text_arg("encode64", &value)?))
}

fn decode64(value: Value) -> Result<String, Error> {
    transform::decode64(text_arg("decode64", &value)?).map_err(failed)
}

fn merge(value: Value, other: Option<Value>) -> Result<Value, Error> {
    let left = map_arg("merge", &value)?;
    let right = match other {
        Some(other) if !other.is_none() && !other.is_undefined() => Some(map_arg("merge", &other)?),
        _ => None,
    };
    Ok(from_map(transform::merge(&left, right.as_ref())))
}

fn re_replace(
    value: Value,
    pattern: &str,
    replacement: &str,
    flags: Option<&str>,
) -> Result<String, Error> {
    let text = text_arg("re_replace", &value)?;
    transform::re_replace(text, pattern, replacement, flags.unwrap_or("")).map_err(failed)
}

fn re_contains(value: Value, pattern: &str, flags: Option<&str>) -> Result<bool, Error> {
    let text = text_arg("re_contains", &value)?;
    transform::re_contains(text, pattern, flags.unwrap_or("")).map_err(failed)
}

fn inflate(value: Value, delimiter: Option<&str>) -> Result<Value, Error> {
    let flat = map_arg("inflate", &value)?;
    let inflated =
        transform::inflate(&flat, delimiter.unwrap_or(DEFAULT_DELIMITER)).map_err(failed)?;
    Ok(from_map(inflated))
}

fn deflate(value: Value, delimiter: Option<&str>) -> Result<Value, Error> {
    let nested = map_arg("deflate", &value)?;
    let deflated =
        transform::deflate(&nested, delimiter.unwrap_or(DEFAULT_DELIMITER)).map_err(failed)?;
    Ok(from_map(deflated))
}

fn typify(value: Value, parser: Option<&str>) -> Result<Value, Error> {
    let parser = match parser {
        Some(name) => name.parse::<TypifyParser>().map_err(failed)?,
        None => TypifyParser::default(),
    };
    Ok(Value::from_serialize(transform::typify(&to_data(&value)?, parser)))
}
