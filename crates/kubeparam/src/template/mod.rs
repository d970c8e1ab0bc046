//! Compiled templates and everything they render against.

pub mod drops;
mod filters;
mod publish;
pub mod redact;
pub mod scope;

use std::fmt;
use std::sync::Arc;

use minijinja::Environment;
use tracing::{debug, info_span};

use crate::error::TemplateError;

pub use drops::{ContextDrop, TemplateHashDrop, TemplatesDrop};
pub use redact::{masked_base64_name, masked_name, Redactor};
pub use scope::Scope;

/// Name used for templates compiled without one.
pub const DEFAULT_TEMPLATE_NAME: &str = "template";

/// Output of a render, raw and with every secret read through its scope
/// masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    pub redacted: String,
}

/// A parsed template, ready to render against any number of scopes.
#[derive(Clone)]
pub struct Template {
    name: String,
    source: String,
    env: Arc<Environment<'static>>,
}

enum Failure {
    Engine(minijinja::Error),
    Template(TemplateError),
}

impl From<minijinja::Error> for Failure {
    fn from(err: minijinja::Error) -> Self {
        Failure::Engine(err)
    }
}

impl Template {
    pub fn compile(source: impl Into<String>) -> Result<Self, TemplateError> {
        Self::compile_named(DEFAULT_TEMPLATE_NAME, source)
    }

    /// Parses `source`. Syntax errors are reported here; unknown variables
    /// and filter failures only surface when rendering.
    pub fn compile_named(
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let name = name.into();
        let source = source.into();

        let mut env = filters::environment();
        env.add_template_owned(name.clone(), publish::instrument(&source).into_owned())
            .map_err(|e| TemplateError::Compile {
                name: name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name,
            source,
            env: Arc::new(env),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, scope: &Scope) -> Result<String, TemplateError> {
        self.render_redacted(scope).map(|rendered| rendered.output)
    }

    /// Renders against `scope`. Top-level assignments made by the template
    /// are written into `scope` as they run. Neither the logged output nor
    /// error text carries the value of a secret read through `scope`.
    pub fn render_redacted(&self, scope: &Scope) -> Result<Rendered, TemplateError> {
        let _span = info_span!("template_render", template = %self.name).entered();
        let _guard = scope.enter();

        let result = self.evaluate(scope);
        let redactor = scope.redactor();
        match result {
            Ok(output) => {
                let redacted = redactor.redact(&output);
                debug!(template = %self.name, output = %redacted, "Rendered template");
                Ok(Rendered { output, redacted })
            }
            Err(Failure::Template(err)) => Err(err),
            Err(Failure::Engine(err)) => {
                let message = redactor.redact(&format!("{}, scope: {}", err, scope.describe()));
                debug!(template = %self.name, error = %message, "Template render failed");
                Err(TemplateError::Render {
                    name: self.name.clone(),
                    message,
                })
            }
        }
    }

    fn evaluate(&self, scope: &Scope) -> Result<String, Failure> {
        let template = self.env.get_template(&self.name)?;
        match template.render_and_return_state(scope.as_context()) {
            Ok((output, state)) => {
                if let Some(failure) = scope.take_failure() {
                    return Err(Failure::Template(failure));
                }
                for name in state.exports() {
                    if let Some(value) = state.lookup(name) {
                        scope.assign(name, value);
                    }
                }
                Ok(output)
            }
            Err(err) => Err(match scope.take_failure() {
                Some(failure) => Failure::Template(failure),
                None => Failure::Engine(err),
            }),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.source == other.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn render(source: &str, scope: &Scope) -> String {
        Template::compile(source).unwrap().render(scope).unwrap()
    }

    #[test]
    fn test_renders_plain_text() {
        assert_eq!(render("hello", &Scope::new()), "hello");
        assert_eq!(render("", &Scope::new()), "");
    }

    #[test]
    fn test_renders_variables() {
        let scope = Scope::new();
        scope.insert("foo", "bar");
        scope.insert("nothing", ());
        assert_eq!(render("[{{ foo }}][{{ nothing }}]", &scope), "[bar][]");
    }

    #[test]
    fn test_display_is_source() {
        let template = Template::compile("{{ foo }}").unwrap();
        assert_eq!(template.to_string(), "{{ foo }}");
    }

    #[test]
    fn test_syntax_error_on_compile() {
        let err = Template::compile("{{ foo").unwrap_err();
        assert!(matches!(err, TemplateError::Compile { .. }));
    }

    #[test]
    fn test_unknown_variable_fails() {
        let template = Template::compile("{{ missing }}").unwrap();
        let err = template.render(&Scope::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
        assert!(err.to_string().contains("undefined"), "{}", err);
    }

    #[test]
    fn test_unknown_filter_fails() {
        let result = Template::compile("{{ 'x' | nope }}")
            .and_then(|t| t.render(&Scope::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_assignments_written_back() {
        let scope = Scope::new();
        render("{% set greeting = 'hi' %}", &scope);
        assert_eq!(scope.get("greeting"), Some(serde_json::json!("hi")));
        assert_eq!(render("{{ greeting }}", &scope), "hi");
    }

    #[test]
    fn test_deferred_forced_once_on_reference() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let scope = Scope::new();
        scope.insert_deferred("lazy", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            serde_json::json!(5)
        });

        assert_eq!(render("static", &scope), "static");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(render("{{ lazy }}{{ lazy }}", &scope), "55");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_secrets_masked_in_redacted_output() {
        let scope = Scope::new();
        scope.insert_secrets("secrets", || {
            BTreeMap::from([
                ("foo".to_string(), "sekret".to_string()),
                ("bar".to_string(), "other".to_string()),
            ])
        });

        let rendered = Template::compile("value: {{ secrets.foo }} {{ secrets.foo | encode64 }}")
            .unwrap()
            .render_redacted(&scope)
            .unwrap();
        assert_eq!(rendered.output, "value: sekret c2VrcmV0");
        assert_eq!(rendered.redacted, "value: <masked:foo> <masked:foo_base64>");
    }

    #[test]
    fn test_secrets_redacted_from_errors() {
        let scope = Scope::new();
        scope.insert_secrets("secrets", || {
            BTreeMap::from([("foo".to_string(), "sekret".to_string())])
        });

        let err = Template::compile("{{ secrets.foo | parse_json }}")
            .unwrap()
            .render(&scope)
            .unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("sekret"), "{}", message);
        assert!(message.contains("<masked:foo>"), "{}", message);
    }

    #[test]
    fn test_unread_secrets_not_fetched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let scope = Scope::new();
        scope.insert_secrets("secrets", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            BTreeMap::new()
        });

        render("nothing secret", &scope);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
