//! Text helpers for embedding values into YAML manifests.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::TransformError;

static RE_BACKREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\(\d+)").unwrap());

/// Prefixes every line of `text` with `count` spaces. Line terminators are
/// kept, so a trailing newline does not start an extra padded line.
pub fn indent(text: &str, count: usize) -> String {
    let pad = " ".repeat(count);
    text.split_inclusive('\n')
        .map(|line| format!("{}{}", pad, line))
        .collect()
}

/// Like [`indent`], with an indented empty line in front so the block can
/// follow a `key:` on the same template line.
pub fn nindent(text: &str, count: usize) -> String {
    indent(&format!("\n{}", text), count)
}

/// Serializes a scalar as a double-quoted string literal.
pub fn stringify(value: &Value) -> Result<String, TransformError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err(TransformError::TypeMismatch {
                function: "stringify",
                expected: "a scalar",
                found: kind_of(value).to_string(),
            })
        }
    };
    serde_json::to_string(&text).map_err(|e| TransformError::Serialize(e.to_string()))
}

/// Builds a regex honouring `flags`: `i` ignores case, `m` lets `.` match
/// newlines, `x` allows whitespace and comments in the pattern.
pub fn build_regex(pattern: &str, flags: &str) -> Result<Regex, TransformError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(TransformError::InvalidFlag(other)),
        };
    }
    builder.build().map_err(|e| TransformError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Replaces every match of `pattern`. `\1`-style backreferences in
/// `replacement` refer to capture groups.
pub fn re_replace(
    text: &str,
    pattern: &str,
    replacement: &str,
    flags: &str,
) -> Result<String, TransformError> {
    let regex = build_regex(pattern, flags)?;
    let escaped = replacement.replace('$', "$$");
    let replacement = RE_BACKREF.replace_all(&escaped, "$${$1}");
    Ok(regex.replace_all(text, replacement.as_ref()).into_owned())
}

/// Tests whether `pattern` matches anywhere in `text`.
pub fn re_contains(text: &str, pattern: &str, flags: &str) -> Result<bool, TransformError> {
    Ok(build_regex(pattern, flags)?.is_match(text))
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indent_each_line() {
        assert_eq!(indent("foo\nbar", 3), "   foo\n   bar");
    }

    #[test]
    fn test_nindent_leading_newline() {
        assert_eq!(nindent("foo\nbar", 3), "   \n   foo\n   bar");
    }

    #[test]
    fn test_indent_trailing_newline_not_padded() {
        assert_eq!(indent("foo\nbar\n", 2), "  foo\n  bar\n");
        assert_eq!(nindent("foo: 1\n", 2), "  \n  foo: 1\n");
        assert_eq!(indent("", 2), "");
    }

    #[test]
    fn test_stringify_quotes() {
        assert_eq!(stringify(&json!("foo")).unwrap(), r#""foo""#);
        assert_eq!(stringify(&json!(r#"foo'"bar"#)).unwrap(), r#""foo'\"bar""#);
        assert_eq!(stringify(&json!(3)).unwrap(), r#""3""#);
        assert!(stringify(&json!([1])).is_err());
    }

    #[test]
    fn test_re_replace() {
        assert_eq!(re_replace("foobar", "o+", "X", "").unwrap(), "fXbar");
    }

    #[test]
    fn test_re_replace_flags() {
        assert_eq!(re_replace("fOObar", "o+", "X", "").unwrap(), "fOObar");
        assert_eq!(re_replace("fOObar", "o+", "X", "i").unwrap(), "fXbar");
        assert_eq!(re_replace("FOO\nOO", "f.*", "X", "i").unwrap(), "X\nOO");
        assert_eq!(re_replace("FOO\nOO", "f.*", "X", "mi").unwrap(), "X");
    }

    #[test]
    fn test_re_replace_backrefs() {
        assert_eq!(re_replace("foobar", "(o+)b", "XX\\1YY", "").unwrap(), "fXXooYYar");
    }

    #[test]
    fn test_re_contains() {
        assert!(re_contains("foobar", "o+", "").unwrap());
        assert!(!re_contains("foobar", "x+", "").unwrap());
        assert!(!re_contains("fOObar", "o+", "").unwrap());
        assert!(re_contains("fOObar", "o+", "i").unwrap());
        assert!(!re_contains("FOO\nOO", "f.{5}", "i").unwrap());
        assert!(re_contains("FOO\nOO", "f.{5}", "mi").unwrap());
    }

    #[test]
    fn test_invalid_flag_and_pattern() {
        assert_eq!(re_contains("a", "a", "q"), Err(TransformError::InvalidFlag('q')));
        assert!(matches!(
            re_contains("a", "(", ""),
            Err(TransformError::InvalidPattern { .. })
        ));
    }
}
