//! Rendering a project's resource templates.
//!
//! The driver fetches a project's parameters, resolves its spec and hands
//! both to this module, which builds the template scope and renders every
//! active template into parsed YAML documents ready to apply.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info_span};

use crate::config::ProjectSpec;
use crate::error::{KubeparamError, TransformError};
use crate::source::TemplateSource;
use crate::template::scope::SecretsProvider;
use crate::template::{Scope, TemplatesDrop};

/// Scope variable names.
pub const PROJECT_VAR: &str = "project";
pub const PARAMETERS_VAR: &str = "parameters";
pub const SECRETS_VAR: &str = "secrets";
pub const CONTEXT_VAR: &str = "context";
pub const TEMPLATES_VAR: &str = "templates";
pub const TEMPLATE_VAR: &str = "template";

/// Everything known about one project for a render pass.
pub struct ProjectContext {
    project: String,
    parameters: BTreeMap<String, Value>,
    secrets: SecretsProvider,
    templates: Option<Arc<dyn TemplateSource>>,
}

impl ProjectContext {
    pub fn new(project: impl Into<String>, parameters: BTreeMap<String, Value>) -> Self {
        Self {
            project: project.into(),
            parameters,
            secrets: Arc::new(BTreeMap::<String, String>::new),
            templates: None,
        }
    }

    /// Sets the secret provider. It runs only if a template reads a secret.
    pub fn with_secrets<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> BTreeMap<String, String> + Send + Sync + 'static,
    {
        self.secrets = Arc::new(provider);
        self
    }

    pub fn with_template_source(mut self, source: Arc<dyn TemplateSource>) -> Self {
        self.templates = Some(source);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Builds the scope templates of `spec` render against. Parameters and
    /// secrets are limited to keys the spec's key selector matches.
    pub fn scope(&self, spec: &ProjectSpec) -> Scope {
        let scope = Scope::new();
        scope.insert(PROJECT_VAR, &self.project);

        let parameters: BTreeMap<&String, &Value> = self
            .parameters
            .iter()
            .filter(|(key, _)| spec.selects_key(key))
            .collect();
        scope.insert(PARAMETERS_VAR, parameters);

        let provider = self.secrets.clone();
        let key_selector = spec.key_selector.clone();
        scope.insert_secrets(SECRETS_VAR, move || {
            provider()
                .into_iter()
                .filter(|(key, _)| key_selector.is_match(key))
                .collect()
        });

        scope.insert_drop(CONTEXT_VAR, spec.context.clone());
        if let Some(source) = &self.templates {
            let drop = TemplatesDrop::new(self.project.as_str(), source.clone());
            scope.insert_drop(TEMPLATES_VAR, Arc::new(drop));
        }
        scope
    }
}

impl std::fmt::Debug for ProjectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectContext")
            .field("project", &self.project)
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("templates", &self.templates.is_some())
            .finish()
    }
}

/// One rendered resource template.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub name: String,
    pub body: String,
    /// Non-empty YAML documents of `body`.
    pub documents: Vec<Value>,
}

/// Renders every active template of `spec`, in order, against `scope`.
/// `template` is set to the current template's name. Skipped specs render
/// nothing.
pub fn render_templates(
    spec: &ProjectSpec,
    scope: &Scope,
) -> Result<Vec<RenderedTemplate>, KubeparamError> {
    if spec.skip {
        debug!(spec = %spec.name, "Skipping project");
        return Ok(Vec::new());
    }

    let _span = info_span!("render_templates", spec = %spec.name).entered();
    let mut rendered = Vec::new();
    for (name, template) in spec.templates() {
        scope.insert(TEMPLATE_VAR, name);
        let body = template.render(scope)?;
        let documents = parse_documents(&body)?;
        debug!(template = name, documents = documents.len(), "Parsed rendered template");
        rendered.push(RenderedTemplate {
            name: name.to_string(),
            body,
            documents,
        });
    }
    Ok(rendered)
}

fn parse_documents(body: &str) -> Result<Vec<Value>, TransformError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(body) {
        let value = Value::deserialize(document).map_err(|e| TransformError::Parse(e.to_string()))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}
