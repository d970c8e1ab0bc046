//! Typed project mapping specs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::resource::MappingScope;
use crate::error::ConfigError;
use crate::logging::parse_level;
use crate::template::{Template, TemplateHashDrop};

/// Field values every spec starts from before the root mapping is applied.
pub fn default_fields() -> Map<String, Value> {
    let defaults = json!({
        "scope": "override",
        "name": "",
        "project_selector": "",
        "key_selector": "",
        "environment": "default",
        "tag": null,
        "skip": false,
        "suppress_namespace_inheritance": false,
        "log_level": null,
        "included_projects": [],
        "context": {},
        "active_templates": null,
        "resource_templates": {},
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSpec {
    scope: MappingScope,
    name: String,
    project_selector: String,
    key_selector: String,
    environment: String,
    tag: Option<String>,
    skip: bool,
    suppress_namespace_inheritance: bool,
    log_level: Option<String>,
    included_projects: Vec<String>,
    context: Map<String, Value>,
    active_templates: Option<Vec<String>>,
    resource_templates: Map<String, Value>,
}

impl Default for RawSpec {
    fn default() -> Self {
        Self {
            scope: MappingScope::Override,
            name: String::new(),
            project_selector: String::new(),
            key_selector: String::new(),
            environment: "default".to_string(),
            tag: None,
            skip: false,
            suppress_namespace_inheritance: false,
            log_level: None,
            included_projects: Vec::new(),
            context: Map::new(),
            active_templates: None,
            resource_templates: Map::new(),
        }
    }
}

/// A fully resolved mapping: compiled selectors, parsed templates and the
/// context exposed to them.
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    pub scope: MappingScope,
    pub name: String,
    /// Matched anywhere in a project name.
    pub project_selector: Regex,
    /// Matched anywhere in a parameter key.
    pub key_selector: Regex,
    pub environment: String,
    pub tag: Option<String>,
    pub skip: bool,
    pub suppress_namespace_inheritance: bool,
    pub log_level: Option<String>,
    pub included_projects: Vec<String>,
    pub context: Arc<TemplateHashDrop>,
    /// `None` means every resource template is active.
    pub active_templates: Option<BTreeSet<String>>,
    /// In document order.
    pub resource_templates: Vec<(String, Template)>,
}

impl ProjectSpec {
    /// Builds a spec from merged mapping fields. Selectors are compiled and
    /// templates parsed here, so a bad mapping fails at load time.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, ConfigError> {
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let raw: RawSpec = serde_json::from_value(Value::Object(fields.clone())).map_err(|e| {
            ConfigError::InvalidMapping {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;

        let project_selector = compile_selector(&raw.name, "project_selector", &raw.project_selector)?;
        let key_selector = compile_selector(&raw.name, "key_selector", &raw.key_selector)?;

        let mut resource_templates = Vec::with_capacity(raw.resource_templates.len());
        for (template_name, body) in &raw.resource_templates {
            let Some(body) = body.as_str() else {
                return Err(ConfigError::InvalidMapping {
                    name: raw.name.clone(),
                    reason: format!("resource template '{}' must be a string", template_name),
                });
            };
            let template = Template::compile_named(template_name.as_str(), body).map_err(|source| {
                ConfigError::InvalidTemplate {
                    name: raw.name.clone(),
                    template: template_name.clone(),
                    source,
                }
            })?;
            resource_templates.push((template_name.clone(), template));
        }

        Ok(Self {
            scope: raw.scope,
            name: raw.name,
            project_selector,
            key_selector,
            environment: raw.environment,
            tag: raw.tag,
            skip: raw.skip,
            suppress_namespace_inheritance: raw.suppress_namespace_inheritance,
            log_level: raw.log_level,
            included_projects: raw.included_projects,
            context: Arc::new(TemplateHashDrop::new(raw.context)),
            active_templates: raw.active_templates.map(|names| names.into_iter().collect()),
            resource_templates,
        })
    }

    /// Active resource templates, in document order.
    pub fn templates(&self) -> Vec<(&str, &Template)> {
        self.resource_templates
            .iter()
            .filter(|(name, _)| match &self.active_templates {
                Some(active) => active.contains(name),
                None => true,
            })
            .map(|(name, template)| (name.as_str(), template))
            .collect()
    }

    pub fn selects_project(&self, project: &str) -> bool {
        self.project_selector.is_match(project)
    }

    pub fn selects_key(&self, key: &str) -> bool {
        self.key_selector.is_match(key)
    }

    /// The parsed `log_level`, if set and recognized.
    pub fn level(&self) -> Option<tracing::Level> {
        self.log_level.as_deref().and_then(parse_level)
    }

    /// `'name:selector'`, as used in ambiguity reports.
    pub fn selector_label(&self) -> String {
        format!("'{}:{}'", self.name, self.project_selector.as_str())
    }

    pub fn to_json(&self) -> Value {
        let templates: Map<String, Value> = self
            .resource_templates
            .iter()
            .map(|(name, template)| (name.clone(), Value::from(template.source())))
            .collect();

        json!({
            "scope": self.scope.as_str(),
            "name": self.name,
            "project_selector": self.project_selector.as_str(),
            "key_selector": self.key_selector.as_str(),
            "environment": self.environment,
            "tag": self.tag,
            "skip": self.skip,
            "suppress_namespace_inheritance": self.suppress_namespace_inheritance,
            "log_level": self.log_level,
            "included_projects": self.included_projects,
            "context": Value::Object(self.context.source().clone()),
            "active_templates": self.active_templates,
            "resource_templates": templates,
        })
    }
}

impl fmt::Display for ProjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn compile_selector(name: &str, field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidSelector {
        name: name.to_string(),
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::merge::overlay;

    fn spec(fields: Value) -> Result<ProjectSpec, ConfigError> {
        let overrides = match fields {
            Value::Object(map) => map,
            other => panic!("expected a map, got {other}"),
        };
        ProjectSpec::from_fields(&overlay(&default_fields(), &overrides))
    }

    #[test]
    fn test_defaults() {
        let spec = spec(json!({})).unwrap();
        assert_eq!(spec.scope, MappingScope::Override);
        assert_eq!(spec.environment, "default");
        assert!(!spec.skip);
        assert!(spec.active_templates.is_none());
        assert!(spec.resource_templates.is_empty());
        assert!(spec.context.is_empty());
        assert!(spec.selects_project("anything"));
    }

    #[test]
    fn test_selectors_compiled() {
        let spec = spec(json!({"project_selector": "^svc", "key_selector": "db"})).unwrap();
        assert!(spec.selects_project("svc-a"));
        assert!(!spec.selects_project("a-svc"));
        assert!(spec.selects_key("the_db_host"));
        assert!(!spec.selects_key("cache"));
    }

    #[test]
    fn test_invalid_selector_fails() {
        let err = spec(json!({"name": "bad", "key_selector": "(unclosed"})).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSelector { field: "key_selector", .. }
        ));
    }

    #[test]
    fn test_invalid_template_fails_at_load() {
        let err = spec(json!({"resource_templates": {"cm": "{{ broken"}})).unwrap_err();
        match err {
            ConfigError::InvalidTemplate { template, .. } => assert_eq!(template, "cm"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_field_fails() {
        let result = spec(json!({"bogus": true}));
        assert!(matches!(result, Err(ConfigError::InvalidMapping { .. })));
    }

    #[test]
    fn test_active_templates_keep_document_order() {
        let spec = spec(json!({
            "resource_templates": {"one": "1", "two": "2", "three": "3"},
            "active_templates": ["three", "one"],
        }))
        .unwrap();

        let names: Vec<&str> = spec.templates().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["one", "three"]);
    }

    #[test]
    fn test_all_templates_active_when_unset() {
        let spec = spec(json!({"resource_templates": {"one": "1", "two": "2"}})).unwrap();
        assert_eq!(spec.templates().len(), 2);
    }

    #[test]
    fn test_level() {
        assert_eq!(spec(json!({"log_level": "debug"})).unwrap().level(), Some(tracing::Level::DEBUG));
        assert_eq!(spec(json!({})).unwrap().level(), None);
    }

    #[test]
    fn test_display_json() {
        let spec = spec(json!({"name": "svc", "project_selector": "^svc"})).unwrap();
        let json: Value = serde_json::from_str(&spec.to_string()).unwrap();
        assert_eq!(json["name"], json!("svc"));
        assert_eq!(json["project_selector"], json!("^svc"));
        assert_eq!(spec.selector_label(), "'svc:^svc'");
    }
}
