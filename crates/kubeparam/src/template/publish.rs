//! Publishing top-level assignments to the shared scope while a render runs.
//!
//! The engine keeps `{% set %}` results in the render's own frame, out of
//! reach of drops that render nested templates part-way through. Every
//! assignment tag is therefore followed by a call to [`PUBLISH_FUNCTION`],
//! which copies the render's top-level variables into its [`Scope`].

use std::borrow::Cow;
use std::sync::LazyLock;

use minijinja::{State, Value};
use regex::{Captures, Regex};

use super::scope::{Scope, SCOPE_HANDLE};

/// Name of the function injected after assignment tags.
pub(crate) const PUBLISH_FUNCTION: &str = "__publish_locals";

/// Comments, raw blocks and expressions are matched only to be skipped, so
/// tag-like text inside them is left alone.
static RE_ASSIGNMENT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)\{#.*?#\}|\{%[-+]?\s*raw\s*[-+]?%\}.*?\{%[-+]?\s*endraw\s*[-+]?%\}|\{\{(?:[^}"']|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\}[^}])*\}\}|\{%[-+]?\s*(?:set|endset)\b(?:[^%"']|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|%[^}])*?(?P<trim>-?)%\}"#,
    )
    .unwrap()
});

/// Appends a publish call after every `set` and `endset` tag of `source`.
/// A tag closed with `-%}` keeps trimming the whitespace that follows it.
pub(crate) fn instrument(source: &str) -> Cow<'_, str> {
    RE_ASSIGNMENT_TAG.replace_all(source, |caps: &Captures| {
        let tag = &caps[0];
        match caps.name("trim") {
            None => tag.to_string(),
            Some(trim) if trim.as_str() == "-" => {
                format!("{}{{{{ {}() -}}}}", tag, PUBLISH_FUNCTION)
            }
            Some(_) => format!("{}{{{{ {}() }}}}", tag, PUBLISH_FUNCTION),
        }
    })
}

/// Copies the render's top-level variables into the scope it renders
/// against. Prints nothing.
pub(crate) fn publish_locals(state: &State) -> Value {
    if let Some(scope) = state.lookup(SCOPE_HANDLE).as_ref().and_then(Scope::from_handle) {
        for name in state.exports() {
            if let Some(value) = state.lookup(name) {
                scope.assign(name, value);
            }
        }
    }
    Value::from(())
}
