//! Lazily evaluated template context objects.
//!
//! A drop is exposed to templates as a variable whose members are computed on
//! access. Rendering a member happens against the same [`Scope`] as the
//! template that accessed it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use super::scope::{lock, Scope};
use super::Template;
use crate::error::TemplateError;
use crate::source::{SourceError, TemplateSource};

/// A context object whose members are resolved on access.
pub trait ContextDrop: fmt::Debug + Send + Sync {
    /// Returns the value of member `key`, or `None` when there is no such
    /// member.
    fn fetch(&self, key: &str, scope: &Scope) -> Result<Option<Value>, TemplateError>;

    /// Inert description used in diagnostics and when the drop itself is
    /// printed. Must not render anything.
    fn describe(&self) -> Value;
}

/// A map whose string values are templates, rendered every time they are read.
///
/// Each string value is compiled on first access and the compiled form is
/// reused afterwards. Non-string values are returned as-is.
#[derive(Debug, Default)]
pub struct TemplateHashDrop {
    source: Map<String, Value>,
    parsed: Mutex<HashMap<String, Arc<Template>>>,
}

impl TemplateHashDrop {
    pub fn new(source: Map<String, Value>) -> Self {
        Self {
            source,
            parsed: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Whether the template under `key` has been compiled yet.
    pub fn is_parsed(&self, key: &str) -> bool {
        lock(&self.parsed).contains_key(key)
    }

    /// Reads `key`, rendering it against `scope` when it is a template.
    pub fn get(&self, key: &str, scope: &Scope) -> Result<Option<Value>, TemplateError> {
        match self.source.get(key) {
            None => Ok(None),
            Some(Value::String(body)) => {
                let template = self.parsed_template(key, body)?;
                template.render(scope).map(|rendered| Some(Value::String(rendered)))
            }
            Some(other) => Ok(Some(other.clone())),
        }
    }

    /// The whole map with every template entry rendered against `scope`.
    pub fn rendered(&self, scope: &Scope) -> Result<Map<String, Value>, TemplateError> {
        let mut rendered = Map::with_capacity(self.source.len());
        for key in self.source.keys() {
            if let Some(value) = self.get(key, scope)? {
                rendered.insert(key.clone(), value);
            }
        }
        Ok(rendered)
    }

    fn parsed_template(&self, key: &str, body: &str) -> Result<Arc<Template>, TemplateError> {
        let mut parsed = lock(&self.parsed);
        if let Some(template) = parsed.get(key) {
            return Ok(template.clone());
        }
        let template = Arc::new(Template::compile_named(key, body)?);
        parsed.insert(key.to_string(), template.clone());
        Ok(template)
    }
}

impl ContextDrop for TemplateHashDrop {
    fn fetch(&self, key: &str, scope: &Scope) -> Result<Option<Value>, TemplateError> {
        self.get(key, scope)
    }

    fn describe(&self) -> Value {
        Value::Object(self.source.clone())
    }
}

impl fmt::Display for TemplateHashDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Member name listing the available templates.
pub const TEMPLATE_NAMES_KEY: &str = "names";

/// Named templates held by an external service for one project.
///
/// `names` lists them; any other member fetches the named template's body and
/// renders it against the current scope.
pub struct TemplatesDrop {
    project: String,
    source: Arc<dyn TemplateSource>,
}

impl TemplatesDrop {
    pub fn new(project: impl Into<String>, source: Arc<dyn TemplateSource>) -> Self {
        Self {
            project: project.into(),
            source,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn names(&self) -> Result<Vec<String>, SourceError> {
        self.source.template_names(&self.project)
    }

    pub fn render(&self, name: &str, scope: &Scope) -> Result<String, TemplateError> {
        let body = self.source.template(name, &self.project)?;
        Template::compile_named(name, body)?.render(scope)
    }
}

impl ContextDrop for TemplatesDrop {
    fn fetch(&self, key: &str, scope: &Scope) -> Result<Option<Value>, TemplateError> {
        if key == TEMPLATE_NAMES_KEY {
            let names = self.names()?;
            return Ok(Some(Value::from(names)));
        }
        self.render(key, scope).map(|rendered| Some(Value::String(rendered)))
    }

    fn describe(&self) -> Value {
        serde_json::json!({ "project": self.project })
    }
}

impl fmt::Debug for TemplatesDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplatesDrop")
            .field("project", &self.project)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hash_drop(value: Value) -> TemplateHashDrop {
        match value {
            Value::Object(map) => TemplateHashDrop::new(map),
            other => panic!("expected a map, got {other}"),
        }
    }

    #[test]
    fn test_hash_drop_renders_against_scope() {
        let scope = Scope::new();
        scope.insert("bar", "baz");
        let drop = hash_drop(json!({"foo": "hello {{ bar }}"}));

        assert_eq!(drop.get("foo", &scope).unwrap(), Some(json!("hello baz")));
    }

    #[test]
    fn test_hash_drop_compiles_on_first_access() {
        let scope = Scope::new();
        let drop = hash_drop(json!({"foo": "one", "bar": "two"}));

        assert!(!drop.is_parsed("foo"));
        drop.get("foo", &scope).unwrap();
        assert!(drop.is_parsed("foo"));
        assert!(!drop.is_parsed("bar"));
    }

    #[test]
    fn test_hash_drop_rerenders_each_access() {
        let scope = Scope::new();
        let drop = hash_drop(json!({"foo": "{{ n }}"}));

        scope.insert("n", 1);
        assert_eq!(drop.get("foo", &scope).unwrap(), Some(json!("1")));
        scope.insert("n", 2);
        assert_eq!(drop.get("foo", &scope).unwrap(), Some(json!("2")));
    }

    #[test]
    fn test_hash_drop_non_strings_untouched() {
        let scope = Scope::new();
        let drop = hash_drop(json!({"num": 3, "nested": {"x": "{{ y }}"}}));

        assert_eq!(drop.get("num", &scope).unwrap(), Some(json!(3)));
        assert_eq!(drop.get("nested", &scope).unwrap(), Some(json!({"x": "{{ y }}"})));
        assert_eq!(drop.get("missing", &scope).unwrap(), None);
    }

    #[test]
    fn test_hash_drop_rendered_map() {
        let scope = Scope::new();
        scope.insert("name", "proj");
        let drop = hash_drop(json!({"a": "x-{{ name }}", "b": true}));

        assert_eq!(
            Value::Object(drop.rendered(&scope).unwrap()),
            json!({"a": "x-proj", "b": true})
        );
    }

    #[test]
    fn test_hash_drop_display_is_raw_map() {
        let drop = hash_drop(json!({"foo": "{{ bar }}"}));
        assert_eq!(drop.to_string(), r#"{"foo":"{{ bar }}"}"#);
    }
}
